//! Painters
//!
//! Drawing strategies on top of a [`Shader`](crate::shader::Shader). Both bind
//! the target, activate the program and bind the scene tier once per call:
//!
//! - [`SinglePainter`] walks each subject's nodes directly and draws every
//!   primitive. No material tier. Used for shadow maps, light volumes and
//!   full-screen quads.
//! - [`BatchPainter`] groups primitives by material first and binds each
//!   material once for all its draws.

mod batch;
mod single;

pub use batch::BatchPainter;
pub use single::SinglePainter;
