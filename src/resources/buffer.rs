//! Owned vertex and index buffers

use std::sync::Arc;

use bytemuck::Pod;

use crate::backend::traits::*;
use crate::backend::types::*;

/// A tightly packed float vertex stream
#[derive(Debug)]
pub struct VertexBuffer {
    handle: BufferHandle,
    components: u32,
    vertex_count: u32,
    disposed: bool,
}

impl VertexBuffer {
    /// Upload a stream of `components`-wide float vectors (`Vec3`, `[f32; 2]`, plain `f32`, ...).
    pub fn new<V: Pod>(
        backend: &mut dyn GraphicsBackend,
        data: &[V],
        components: u32,
    ) -> BackendResult<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let stride = components.max(1) as usize * std::mem::size_of::<f32>();
        let handle = backend.create_buffer(BufferKind::Vertex, bytes)?;
        Ok(Self {
            handle,
            components,
            vertex_count: (bytes.len() / stride) as u32,
            disposed: false,
        })
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn components(&self) -> u32 {
        self.components
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn dispose(mut self, backend: &mut dyn GraphicsBackend) -> BackendResult<()> {
        self.disposed = true;
        backend.destroy_buffer(self.handle)
    }
}

impl Drop for VertexBuffer {
    fn drop(&mut self) {
        if !self.disposed {
            log::warn!("VertexBuffer {:?} dropped without dispose", self.handle);
        }
    }
}

/// Triangle indices. The element count is fixed at upload and drives every draw.
#[derive(Debug)]
pub struct IndexBuffer {
    handle: BufferHandle,
    count: u32,
    format: IndexFormat,
    disposed: bool,
}

impl IndexBuffer {
    /// Upload indices, narrowing to 16 bits when every index fits.
    pub fn new(backend: &mut dyn GraphicsBackend, indices: &[u32]) -> BackendResult<Self> {
        let narrow = indices.iter().all(|&i| i <= u16::MAX as u32);
        let handle = if narrow {
            let short: Vec<u16> = indices.iter().map(|&i| i as u16).collect();
            backend.create_buffer(BufferKind::Index, bytemuck::cast_slice(&short))?
        } else {
            backend.create_buffer(BufferKind::Index, bytemuck::cast_slice(indices))?
        };
        Ok(Self {
            handle,
            count: indices.len() as u32,
            format: if narrow {
                IndexFormat::Uint16
            } else {
                IndexFormat::Uint32
            },
            disposed: false,
        })
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn format(&self) -> IndexFormat {
        self.format
    }

    /// Issue an indexed draw over the whole buffer.
    pub fn draw(&self, backend: &mut dyn GraphicsBackend) {
        backend.draw_indexed(self.handle, self.count, self.format);
    }

    pub fn dispose(mut self, backend: &mut dyn GraphicsBackend) -> BackendResult<()> {
        self.disposed = true;
        backend.destroy_buffer(self.handle)
    }

    /// Drop one shared reference, disposing the buffer if it was the last one.
    pub fn release(this: Arc<Self>, backend: &mut dyn GraphicsBackend) -> BackendResult<()> {
        match Arc::try_unwrap(this) {
            Ok(buffer) => buffer.dispose(backend),
            Err(_) => Ok(()),
        }
    }
}

impl Drop for IndexBuffer {
    fn drop(&mut self) {
        if !self.disposed {
            log::warn!("IndexBuffer {:?} dropped without dispose", self.handle);
        }
    }
}
