//! Declarations shared by every pipeline drawing scene geometry

use std::sync::Arc;

use glam::Mat4;

use crate::backend::{AttributeType, GraphicsBackend};
use crate::batch::GeometryState;
use crate::error::{RenderResult, ShaderError};
use crate::resources::{IndexBuffer, Material, MaterialFeatures, MeshData, Polygon, VertexBuffer};
use crate::scene::{Model, Primitive, Subject, TransformState};
use crate::shader::{uniform, Declaration, Directives, ShaderBuilder};

/// Material terms a surface shader reads, combined with the configured maps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceInputs {
    pub albedo: bool,
    pub emissive: bool,
    pub specular: bool,
    pub normals: bool,
    pub features: MaterialFeatures,
}

impl SurfaceInputs {
    pub fn new(features: MaterialFeatures) -> Self {
        Self {
            features,
            ..Default::default()
        }
    }

    pub fn with_albedo(mut self) -> Self {
        self.albedo = true;
        self
    }

    pub fn with_emissive(mut self) -> Self {
        self.emissive = true;
        self
    }

    pub fn with_specular(mut self) -> Self {
        self.specular = true;
        self
    }

    pub fn with_normals(mut self) -> Self {
        self.normals = true;
        self
    }

    pub fn albedo_map(&self) -> bool {
        self.albedo && self.features.albedo_map
    }

    pub fn emissive_map(&self) -> bool {
        self.emissive && self.features.emissive_map
    }

    pub fn gloss_map(&self) -> bool {
        self.specular && self.features.gloss_map
    }

    pub fn normal_map(&self) -> bool {
        self.normals && self.features.normal_map
    }

    pub fn coords(&self) -> bool {
        self.albedo_map() || self.emissive_map() || self.gloss_map() || self.normal_map()
    }

    /// Every `USE_*` flag, always defined so `#if` never sees an undefined name.
    pub fn directives(&self) -> Directives {
        Directives::new()
            .with("USE_ALBEDO", self.albedo)
            .with("USE_EMISSIVE", self.emissive)
            .with("USE_SPECULAR", self.specular)
            .with("USE_NORMALS", self.normals)
            .with("USE_COORDS", self.coords())
            .with("USE_TANGENTS", self.normal_map())
            .with("USE_ALBEDO_MAP", self.albedo_map())
            .with("USE_EMISSIVE_MAP", self.emissive_map())
            .with("USE_GLOSS_MAP", self.gloss_map())
            .with("USE_NORMAL_MAP", self.normal_map())
    }

    /// Material-tier factors and maps.
    pub fn declare_material(&self, material: &mut Declaration<'_, Material>) -> Result<(), ShaderError> {
        if self.albedo {
            material.set_uniform("albedoFactor", uniform::vec4(|m: &Material| m.albedo_factor))?;
            if self.albedo_map() {
                material.set_uniform("albedoMap", uniform::texture(Material::albedo_texture))?;
            }
        }
        if self.emissive {
            material.set_uniform("emissiveFactor", uniform::vec3(|m: &Material| m.emissive_factor))?;
            if self.emissive_map() {
                material.set_uniform("emissiveMap", uniform::texture(Material::emissive_texture))?;
            }
        }
        if self.specular {
            material
                .set_uniform("glossFactor", uniform::float(|m: &Material| m.gloss_factor))?
                .set_uniform("shininess", uniform::float(|m: &Material| m.shininess))?;
            if self.gloss_map() {
                material.set_uniform("glossMap", uniform::texture(Material::gloss_texture))?;
            }
        }
        if self.normal_map() {
            material.set_uniform("normalMap", uniform::texture(Material::normal_texture))?;
        }
        Ok(())
    }

    /// `modelMatrix` plus `normalMatrix` when normals are read.
    pub fn declare_geometry(&self, geometry: &mut Declaration<'_, GeometryState>) -> Result<(), ShaderError> {
        geometry.set_uniform("modelMatrix", uniform::mat4(|g: &GeometryState| g.world))?;
        if self.normals {
            geometry.set_uniform("normalMatrix", uniform::mat3(|g: &GeometryState| g.normal))?;
        }
        Ok(())
    }

    /// Vertex streams the variant reads.
    pub fn declare_polygon(&self, polygon: &mut Declaration<'_, Polygon>) -> Result<(), ShaderError> {
        declare_points(polygon)?;
        if self.normals {
            polygon.set_attribute("normals", 3, AttributeType::Float, |p: &Polygon| {
                p.normals.as_ref().map(VertexBuffer::handle)
            })?;
        }
        if self.coords() {
            polygon.set_attribute("coords", 2, AttributeType::Float, |p: &Polygon| {
                p.coords.as_ref().map(VertexBuffer::handle)
            })?;
        }
        if self.normal_map() {
            polygon.set_attribute("tangents", 3, AttributeType::Float, |p: &Polygon| {
                p.tangents.as_ref().map(VertexBuffer::handle)
            })?;
        }
        Ok(())
    }

    /// Material, geometry and polygon tiers of a surface shader.
    pub fn declare<S: 'static>(&self, builder: &mut ShaderBuilder<'_, S>) -> Result<(), ShaderError> {
        self.declare_material(&mut builder.material())?;
        self.declare_geometry(&mut builder.geometry())?;
        self.declare_polygon(&mut builder.polygon())
    }
}

/// The `points` stream every shader reads.
pub fn declare_points(polygon: &mut Declaration<'_, Polygon>) -> Result<(), ShaderError> {
    polygon.set_attribute("points", 3, AttributeType::Float, |p: &Polygon| Some(p.points.handle()))?;
    Ok(())
}

/// `projectionMatrix` and `viewMatrix` from the frame's camera.
pub fn declare_camera<S>(scene: &mut Declaration<'_, S>) -> Result<(), ShaderError>
where
    S: AsRef<TransformState> + 'static,
{
    scene
        .set_uniform("projectionMatrix", uniform::mat4(|s: &S| s.as_ref().projection))?
        .set_uniform("viewMatrix", uniform::mat4(|s: &S| s.as_ref().view))?;
    Ok(())
}

/// A mesh drawn on behalf of a pass rather than the scene: full-screen quads and light volumes
pub struct VolumeMesh {
    model: Arc<Model>,
    index_buffer: Arc<IndexBuffer>,
    polygon: Arc<Polygon>,
}

impl VolumeMesh {
    pub fn new(backend: &mut dyn GraphicsBackend, mesh: &MeshData) -> RenderResult<Self> {
        let (polygon, index_buffer) = mesh.upload(backend)?;
        let polygon = Arc::new(polygon);
        let index_buffer = Arc::new(index_buffer);
        let material = Arc::new(Material::new(&mesh.name));
        let model = Arc::new(Model::single(Primitive::new(
            index_buffer.clone(),
            material,
            polygon.clone(),
        )));
        Ok(Self {
            model,
            index_buffer,
            polygon,
        })
    }

    pub fn fullscreen_quad(backend: &mut dyn GraphicsBackend) -> RenderResult<Self> {
        Self::new(backend, &MeshData::fullscreen_quad())
    }

    pub fn light_sphere(backend: &mut dyn GraphicsBackend, segments: u32) -> RenderResult<Self> {
        Self::new(backend, &MeshData::light_sphere(segments))
    }

    /// The mesh placed by `transform`, ready for a painter.
    pub fn subject(&self, transform: Mat4) -> Subject {
        Subject::new(transform, self.model.clone())
    }

    pub fn dispose(self, backend: &mut dyn GraphicsBackend) -> RenderResult<()> {
        drop(self.model);
        IndexBuffer::release(self.index_buffer, backend)?;
        Polygon::release(self.polygon, backend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_follow_enabled_terms() {
        let inputs = SurfaceInputs::new(MaterialFeatures::all()).with_albedo();
        let directives = inputs.directives();
        assert!(inputs.albedo_map());
        assert!(!inputs.normal_map());
        assert_eq!(directives.get("USE_COORDS"), Some(true.into()));
        assert_eq!(directives.get("USE_TANGENTS"), Some(false.into()));
        assert_eq!(directives.get("USE_GLOSS_MAP"), Some(false.into()));
    }
}
