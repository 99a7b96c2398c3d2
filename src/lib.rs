//! # Lilium Renderer
//!
//! A material-batched scene renderer over a GL-style backend.
//!
//! ## Overview
//!
//! - [`backend`] - The native interface, a recording dummy backend and an OpenGL backend
//! - [`resources`] - Owned buffers and textures, meshes and materials
//! - [`shader`] - Programs with bindings declared per tier (scene, material, geometry, polygon)
//! - [`batch`] - Scene-graph traversal grouping primitives by material
//! - [`painter`] - Single-object and material-batched drawing strategies
//! - [`target`] - Default and offscreen framebuffers
//! - [`pipeline`] - Forward, forward lighting, deferred shading and deferred lighting
//!
//! ## Example
//!
//! ```ignore
//! use lilium_renderer::{create_pipeline, DummyBackend, RendererConfig, Scene, Target};
//!
//! let mut backend = DummyBackend::new();
//! let config = RendererConfig::default();
//! let mut pipeline = create_pipeline(&mut backend, &config)?;
//! let target = Target::default_framebuffer(config.width, config.height);
//! pipeline.process(&mut backend, &target, &camera.transform_state(), &scene)?;
//! ```

pub mod backend;
pub mod batch;
pub mod error;
pub mod painter;
pub mod pipeline;
pub mod resources;
pub mod scene;
pub mod shader;
pub mod target;

pub use backend::{DummyBackend, GraphicsBackend};
#[cfg(feature = "gl-backend")]
pub use backend::GlBackend;
pub use batch::{BatchMap, GeometryState};
pub use error::{BindingError, RenderError, RenderResult, ShaderError};
pub use painter::{BatchPainter, SinglePainter};
pub use pipeline::{create_pipeline, Pipeline};
pub use resources::{Material, MaterialFeatures, MeshData};
pub use scene::{Camera, DirectionalLight, PointLight, Scene, Subject, TransformState};
pub use shader::{Shader, ShaderBuilder, ShaderSource, Tier};
pub use target::Target;

/// Renderer library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library version.
pub fn init() {
    log::info!("Lilium Renderer v{} initialized", VERSION);
}

/// Which rendering algorithm to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineKind {
    /// Single material-batched pass with lights as uniform arrays
    #[default]
    Forward,
    /// Shadow-mapped forward rendering, one additive pass per light
    ForwardLighting,
    /// G-buffer followed by screen-space light passes
    DeferredShading,
    /// Light accumulation between two geometry passes
    DeferredLighting,
}

/// Configuration for building a pipeline
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    pub pipeline: PipelineKind,
    /// Directional lights the forward pipeline uploads; the rest are ignored
    pub max_directional_lights: u32,
    /// Point lights the forward pipeline uploads; the rest are ignored
    pub max_point_lights: u32,
    /// Width and height of each shadow map
    pub shadow_map_size: u32,
    /// Half-size of the orthographic light frustum, world units
    pub shadow_extent: f32,
    /// Half-depth of the orthographic light frustum, world units
    pub shadow_depth_range: f32,
    /// Depth offset against shadow acne
    pub shadow_bias: f32,
    /// Longitude segments of point-light volumes
    pub light_sphere_segments: u32,
    /// Texture maps every drawn material must provide
    pub features: MaterialFeatures,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            pipeline: PipelineKind::Forward,
            max_directional_lights: 4,
            max_point_lights: 16,
            shadow_map_size: 2048,
            shadow_extent: 20.0,
            shadow_depth_range: 50.0,
            shadow_bias: 0.005,
            light_sphere_segments: 16,
            features: MaterialFeatures::default(),
        }
    }
}

impl RendererConfig {
    pub fn with_pipeline(mut self, pipeline: PipelineKind) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_features(mut self, features: MaterialFeatures) -> Self {
        self.features = features;
        self
    }

    pub fn validate(&self) -> RenderResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidConfig(format!(
                "output size {}x{} is empty",
                self.width, self.height
            )));
        }
        if self.max_directional_lights == 0 || self.max_point_lights == 0 {
            return Err(RenderError::InvalidConfig(
                "light limits must be at least 1".to_string(),
            ));
        }
        if self.shadow_map_size == 0 {
            return Err(RenderError::InvalidConfig("shadow map size is zero".to_string()));
        }
        if !(self.shadow_extent > 0.0 && self.shadow_depth_range > 0.0) {
            return Err(RenderError::InvalidConfig(
                "shadow frustum must have a positive size".to_string(),
            ));
        }
        if self.light_sphere_segments < 3 {
            return Err(RenderError::InvalidConfig(format!(
                "light spheres need at least 3 segments, got {}",
                self.light_sphere_segments
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RendererConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_size_is_rejected() {
        let config = RendererConfig::default().with_size(0, 600);
        assert!(matches!(config.validate(), Err(RenderError::InvalidConfig(_))));
    }
}
