//! Backend abstraction layer
//!
//! Provides the GL-style native interface that the binding registry, painters
//! and pipelines are written against, plus two implementations: a recording
//! dummy backend and an OpenGL backend over glow.

pub mod dummy;
pub mod traits;
pub mod types;

#[cfg(feature = "gl-backend")]
pub mod gl;

pub use dummy::{Command, DummyBackend, RecordedUniform};
#[cfg(feature = "gl-backend")]
pub use gl::GlBackend;
pub use traits::*;
pub use types::*;
