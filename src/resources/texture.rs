//! Texture data and owned GPU textures

use std::sync::Arc;

use crate::backend::traits::*;
use crate::backend::types::*;

/// CPU-side RGBA8 pixels
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub data: Vec<u8>,
    pub name: String,
}

impl TextureData {
    /// Create a solid color texture
    pub fn solid_color(color: [u8; 4], name: &str) -> Self {
        Self {
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8Unorm,
            data: color.to_vec(),
            name: name.to_string(),
        }
    }

    pub fn white() -> Self {
        Self::solid_color([255, 255, 255, 255], "white")
    }

    /// Create a checkerboard texture with 8x8 pixel cells
    pub fn checkerboard(size: u32, color1: [u8; 4], color2: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity((size * size * 4) as usize);

        for y in 0..size {
            for x in 0..size {
                let is_even = ((x / 8) + (y / 8)) % 2 == 0;
                let color = if is_even { color1 } else { color2 };
                data.extend_from_slice(&color);
            }
        }

        Self {
            width: size,
            height: size,
            format: TextureFormat::Rgba8Unorm,
            data,
            name: "checkerboard".to_string(),
        }
    }

    pub fn descriptor(&self) -> TextureDescriptor {
        TextureDescriptor {
            label: Some(self.name.clone()),
            width: self.width,
            height: self.height,
            format: self.format,
            filter: FilterMode::Linear,
            address_mode: AddressMode::Repeat,
        }
    }
}

/// An owned GPU texture
#[derive(Debug)]
pub struct Texture {
    handle: TextureHandle,
    descriptor: TextureDescriptor,
    disposed: bool,
}

impl Texture {
    /// Allocate a texture, optionally with initial pixels.
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        descriptor: TextureDescriptor,
        data: Option<&[u8]>,
    ) -> BackendResult<Self> {
        let handle = backend.create_texture(&descriptor, data)?;
        Ok(Self {
            handle,
            descriptor,
            disposed: false,
        })
    }

    /// Upload CPU pixels.
    pub fn from_data(backend: &mut dyn GraphicsBackend, data: &TextureData) -> BackendResult<Self> {
        Self::new(backend, data.descriptor(), Some(&data.data))
    }

    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    pub fn width(&self) -> u32 {
        self.descriptor.width
    }

    pub fn height(&self) -> u32 {
        self.descriptor.height
    }

    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    pub fn dispose(mut self, backend: &mut dyn GraphicsBackend) -> BackendResult<()> {
        self.disposed = true;
        backend.destroy_texture(self.handle)
    }

    /// Drop one shared reference, disposing the texture if it was the last one.
    pub fn release(this: Arc<Self>, backend: &mut dyn GraphicsBackend) -> BackendResult<()> {
        match Arc::try_unwrap(this) {
            Ok(texture) => texture.dispose(backend),
            Err(_) => Ok(()),
        }
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        if !self.disposed {
            log::warn!(
                "Texture {:?} ({:?}) dropped without dispose",
                self.descriptor.label,
                self.handle
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    #[test]
    fn test_checkerboard_cells() {
        let data = TextureData::checkerboard(16, [255; 4], [0, 0, 0, 255]);
        assert_eq!(data.data.len(), 16 * 16 * 4);
        assert_eq!(&data.data[0..4], &[255; 4]);
        // pixel (8, 0) starts the second cell
        assert_eq!(&data.data[8 * 4..8 * 4 + 4], &[0, 0, 0, 255]);
    }

    #[test]
    fn test_texture_lifecycle() {
        let mut backend = DummyBackend::new();
        let texture = Texture::from_data(&mut backend, &TextureData::white()).unwrap();
        assert_eq!(backend.live_textures(), 1);
        assert_eq!(
            backend.texture_descriptor(texture.handle()).map(|d| d.width),
            Some(1)
        );
        texture.dispose(&mut backend).unwrap();
        assert_eq!(backend.live_textures(), 0);
    }
}
