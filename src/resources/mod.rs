//! Resource management
//!
//! Owned GPU buffers and textures plus the CPU-side mesh, texture and material data feeding them.

mod buffer;
mod material;
mod mesh;
mod texture;

pub use buffer::*;
pub use material::*;
pub use mesh::*;
pub use texture::*;
