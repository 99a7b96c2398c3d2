//! Surface materials
//!
//! Materials are immutable once shared. Primitives hold them as `Arc<Material>`
//! and the batching layer groups draws by that pointer, so two structurally
//! equal materials still form two batches.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::{Vec3, Vec4};

use super::texture::Texture;
use crate::backend::traits::{BackendResult, GraphicsBackend, TextureHandle};

static NEXT_MATERIAL_ID: AtomicU64 = AtomicU64::new(1);

/// Blinn-Phong surface description
#[derive(Debug)]
pub struct Material {
    id: u64,
    pub name: String,
    pub albedo_factor: Vec4,
    pub emissive_factor: Vec3,
    /// Specular intensity in `[0, 1]`
    pub gloss_factor: f32,
    /// Specular exponent, at least 1
    pub shininess: f32,
    pub metalness_factor: f32,
    pub roughness_factor: f32,
    pub parallax_bias: f32,
    pub parallax_scale: f32,

    pub albedo_map: Option<Arc<Texture>>,
    pub normal_map: Option<Arc<Texture>>,
    pub height_map: Option<Arc<Texture>>,
    pub occlusion_map: Option<Arc<Texture>>,
    pub emissive_map: Option<Arc<Texture>>,
    pub gloss_map: Option<Arc<Texture>>,
    pub metalness_map: Option<Arc<Texture>>,
    pub roughness_map: Option<Arc<Texture>>,
}

impl Default for Material {
    fn default() -> Self {
        Self::new("default")
    }
}

// A clone is a new material with its own id.
impl Clone for Material {
    fn clone(&self) -> Self {
        Self {
            id: NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed),
            name: self.name.clone(),
            albedo_factor: self.albedo_factor,
            emissive_factor: self.emissive_factor,
            gloss_factor: self.gloss_factor,
            shininess: self.shininess,
            metalness_factor: self.metalness_factor,
            roughness_factor: self.roughness_factor,
            parallax_bias: self.parallax_bias,
            parallax_scale: self.parallax_scale,
            albedo_map: self.albedo_map.clone(),
            normal_map: self.normal_map.clone(),
            height_map: self.height_map.clone(),
            occlusion_map: self.occlusion_map.clone(),
            emissive_map: self.emissive_map.clone(),
            gloss_map: self.gloss_map.clone(),
            metalness_map: self.metalness_map.clone(),
            roughness_map: self.roughness_map.clone(),
        }
    }
}

impl Material {
    pub fn new(name: &str) -> Self {
        Self {
            id: NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            albedo_factor: Vec4::ONE,
            emissive_factor: Vec3::ZERO,
            gloss_factor: 0.5,
            shininess: 32.0,
            metalness_factor: 0.0,
            roughness_factor: 0.5,
            parallax_bias: 0.0,
            parallax_scale: 0.0,
            albedo_map: None,
            normal_map: None,
            height_map: None,
            occlusion_map: None,
            emissive_map: None,
            gloss_map: None,
            metalness_map: None,
            roughness_map: None,
        }
    }

    /// Process-unique id, stable for the material's lifetime.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn with_albedo(mut self, color: Vec4) -> Self {
        self.albedo_factor = color;
        self
    }

    pub fn with_emissive(mut self, color: Vec3) -> Self {
        self.emissive_factor = color;
        self
    }

    pub fn with_specular(mut self, gloss: f32, shininess: f32) -> Self {
        self.gloss_factor = gloss.clamp(0.0, 1.0);
        self.shininess = shininess.max(1.0);
        self
    }

    pub fn with_metalness_roughness(mut self, metalness: f32, roughness: f32) -> Self {
        self.metalness_factor = metalness;
        self.roughness_factor = roughness;
        self
    }

    pub fn with_parallax(mut self, bias: f32, scale: f32) -> Self {
        self.parallax_bias = bias;
        self.parallax_scale = scale;
        self
    }

    pub fn with_albedo_map(mut self, texture: Arc<Texture>) -> Self {
        self.albedo_map = Some(texture);
        self
    }

    pub fn with_normal_map(mut self, texture: Arc<Texture>) -> Self {
        self.normal_map = Some(texture);
        self
    }

    pub fn with_height_map(mut self, texture: Arc<Texture>) -> Self {
        self.height_map = Some(texture);
        self
    }

    pub fn with_occlusion_map(mut self, texture: Arc<Texture>) -> Self {
        self.occlusion_map = Some(texture);
        self
    }

    pub fn with_emissive_map(mut self, texture: Arc<Texture>) -> Self {
        self.emissive_map = Some(texture);
        self
    }

    pub fn with_gloss_map(mut self, texture: Arc<Texture>) -> Self {
        self.gloss_map = Some(texture);
        self
    }

    pub fn with_metalness_map(mut self, texture: Arc<Texture>) -> Self {
        self.metalness_map = Some(texture);
        self
    }

    pub fn with_roughness_map(mut self, texture: Arc<Texture>) -> Self {
        self.roughness_map = Some(texture);
        self
    }

    pub fn albedo_texture(&self) -> Option<TextureHandle> {
        self.albedo_map.as_ref().map(|t| t.handle())
    }

    pub fn normal_texture(&self) -> Option<TextureHandle> {
        self.normal_map.as_ref().map(|t| t.handle())
    }

    pub fn emissive_texture(&self) -> Option<TextureHandle> {
        self.emissive_map.as_ref().map(|t| t.handle())
    }

    pub fn gloss_texture(&self) -> Option<TextureHandle> {
        self.gloss_map.as_ref().map(|t| t.handle())
    }

    /// Which maps this material can feed.
    pub fn features(&self) -> MaterialFeatures {
        MaterialFeatures {
            albedo_map: self.albedo_map.is_some(),
            normal_map: self.normal_map.is_some(),
            emissive_map: self.emissive_map.is_some(),
            gloss_map: self.gloss_map.is_some(),
        }
    }

    /// Release this material's references to its maps, disposing maps no one else holds.
    pub fn dispose(self, backend: &mut dyn GraphicsBackend) -> BackendResult<()> {
        let maps = [
            self.albedo_map,
            self.normal_map,
            self.height_map,
            self.occlusion_map,
            self.emissive_map,
            self.gloss_map,
            self.metalness_map,
            self.roughness_map,
        ];
        for map in maps.into_iter().flatten() {
            Texture::release(map, backend)?;
        }
        Ok(())
    }

    /// Glossy dielectric preset
    pub fn plastic(color: Vec3) -> Self {
        Self::new("plastic")
            .with_albedo(color.extend(1.0))
            .with_specular(0.5, 32.0)
    }
}

/// Texture maps the active shader variant samples.
///
/// Each enabled flag turns into a `USE_*_MAP` directive and a material-tier
/// texture binding, so every material drawn with that variant must provide the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaterialFeatures {
    pub albedo_map: bool,
    pub normal_map: bool,
    pub emissive_map: bool,
    pub gloss_map: bool,
}

impl MaterialFeatures {
    pub fn all() -> Self {
        Self {
            albedo_map: true,
            normal_map: true,
            emissive_map: true,
            gloss_map: true,
        }
    }

    pub fn with_albedo_map(mut self) -> Self {
        self.albedo_map = true;
        self
    }

    pub fn with_normal_map(mut self) -> Self {
        self.normal_map = true;
        self
    }

    pub fn with_emissive_map(mut self) -> Self {
        self.emissive_map = true;
        self
    }

    pub fn with_gloss_map(mut self) -> Self {
        self.gloss_map = true;
        self
    }

    /// True when `other` provides every map this variant samples.
    pub fn satisfied_by(&self, other: &MaterialFeatures) -> bool {
        (!self.albedo_map || other.albedo_map)
            && (!self.normal_map || other.normal_map)
            && (!self.emissive_map || other.emissive_map)
            && (!self.gloss_map || other.gloss_map)
    }
}
