//! Shader binding registry
//!
//! A [`Shader`] is a linked program plus four ordered binding lists, one per
//! [`Tier`]. Bindings are declared once through a [`ShaderBuilder`] and
//! replayed against typed tier state before each draw:
//!
//! ```ignore
//! let mut builder = ShaderBuilder::<TransformState>::new(backend, "flat", &source)?;
//! builder.scene().set_uniform("viewMatrix", uniform::mat4(|s: &TransformState| s.view))?;
//! builder.polygon().set_attribute("points", 3, AttributeType::Float, |p: &Polygon| {
//!     Some(p.points.handle())
//! })?;
//! let shader = builder.build();
//! ```

pub mod binding;
pub mod directives;
pub mod library;
pub mod uniform;

pub use binding::{Binder, BindingKind, Declaration, TextureUnit, TextureUnitAllocator, Tier};
pub use directives::{DirectiveValue, Directives, ShaderSource};
pub use uniform::UniformAccessor;

use std::mem;

use log::{debug, error};

use crate::backend::{BackendError, GraphicsBackend, ProgramHandle};
use crate::batch::GeometryState;
use crate::error::{BindingError, ShaderError};
use crate::resources::{Material, Polygon};

/// A linked program with its tiered bindings
///
/// `S` is the scene-tier state, `M` the material, `G` the per-draw geometry
/// and `P` the vertex streams.
pub struct Shader<S, M = Material, G = GeometryState, P = Polygon> {
    label: String,
    program: ProgramHandle,
    scene: Binder<S>,
    material: Binder<M>,
    geometry: Binder<G>,
    polygon: Binder<P>,
    units: TextureUnitAllocator,
    disposed: bool,
}

impl<S, M, G, P> Shader<S, M, G, P> {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    /// Texture units handed out while the bindings were declared.
    pub fn texture_units(&self) -> &TextureUnitAllocator {
        &self.units
    }

    /// Declared names of one tier, in binding order.
    pub fn bindings(&self, tier: Tier) -> &[String] {
        match tier {
            Tier::Scene => self.scene.names(),
            Tier::Material => self.material.names(),
            Tier::Geometry => self.geometry.names(),
            Tier::Polygon => self.polygon.names(),
        }
    }

    pub fn activate(&self, backend: &mut dyn GraphicsBackend) {
        backend.use_program(self.program);
    }

    pub fn bind_scene(&mut self, state: &S, backend: &mut dyn GraphicsBackend) -> Result<(), BindingError> {
        self.scene.bind(state, backend)
    }

    pub fn bind_material(&mut self, state: &M, backend: &mut dyn GraphicsBackend) -> Result<(), BindingError> {
        self.material.bind(state, backend)
    }

    pub fn bind_geometry(&mut self, state: &G, backend: &mut dyn GraphicsBackend) -> Result<(), BindingError> {
        self.geometry.bind(state, backend)
    }

    pub fn bind_polygon(&mut self, state: &P, backend: &mut dyn GraphicsBackend) -> Result<(), BindingError> {
        self.polygon.bind(state, backend)
    }

    pub fn dispose(mut self, backend: &mut dyn GraphicsBackend) -> Result<(), BackendError> {
        self.disposed = true;
        backend.destroy_program(self.program)
    }
}

impl<S, M, G, P> Drop for Shader<S, M, G, P> {
    fn drop(&mut self) {
        if !self.disposed {
            log::warn!("Shader '{}' dropped without dispose", self.label);
        }
    }
}

/// Compiles a program and collects its binding declarations
///
/// Dropping the builder without calling [`build`](Self::build), for instance
/// after a declaration failed, destroys the program.
pub struct ShaderBuilder<'b, S, M = Material, G = GeometryState, P = Polygon> {
    backend: &'b mut dyn GraphicsBackend,
    label: String,
    program: ProgramHandle,
    scene: Binder<S>,
    material: Binder<M>,
    geometry: Binder<G>,
    polygon: Binder<P>,
    units: TextureUnitAllocator,
    built: bool,
}

impl<'b, S: 'static, M: 'static, G: 'static, P: 'static> ShaderBuilder<'b, S, M, G, P> {
    /// Compile `source` with its directives behind the backend's version header.
    pub fn new(
        backend: &'b mut dyn GraphicsBackend,
        label: &str,
        source: &ShaderSource,
    ) -> Result<Self, ShaderError> {
        let header = backend.glsl_header().to_string();
        let vertex = source.compose(&header, &source.vertex);
        let fragment = source.compose(&header, &source.fragment);

        let program = backend
            .create_program(&vertex, &fragment)
            .map_err(|err| match err {
                BackendError::ShaderCompilationFailed { stage, log } => {
                    let text = match stage {
                        crate::backend::ShaderStage::Vertex => &vertex,
                        crate::backend::ShaderStage::Fragment => &fragment,
                    };
                    let window = directives::source_window(text, directives::error_line(&log), 2);
                    error!("Shader '{}': {} stage failed to compile\n{}\n{}", label, stage, log, window);
                    ShaderError::Compilation {
                        stage,
                        message: log,
                        window,
                    }
                }
                BackendError::ProgramLinkFailed(log) => {
                    error!("Shader '{}': link failed: {}", label, log);
                    ShaderError::Link(log)
                }
                other => ShaderError::Backend(other),
            })?;

        debug!("Compiled shader '{}' ({} directives)", label, source.directives.len());

        Ok(Self {
            backend,
            label: label.to_string(),
            program,
            scene: Binder::new(Tier::Scene),
            material: Binder::new(Tier::Material),
            geometry: Binder::new(Tier::Geometry),
            polygon: Binder::new(Tier::Polygon),
            units: TextureUnitAllocator::new(),
            built: false,
        })
    }

    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    pub fn scene(&mut self) -> Declaration<'_, S> {
        Declaration {
            backend: &mut *self.backend,
            program: self.program,
            binder: &mut self.scene,
            units: &mut self.units,
        }
    }

    pub fn material(&mut self) -> Declaration<'_, M> {
        Declaration {
            backend: &mut *self.backend,
            program: self.program,
            binder: &mut self.material,
            units: &mut self.units,
        }
    }

    pub fn geometry(&mut self) -> Declaration<'_, G> {
        Declaration {
            backend: &mut *self.backend,
            program: self.program,
            binder: &mut self.geometry,
            units: &mut self.units,
        }
    }

    pub fn polygon(&mut self) -> Declaration<'_, P> {
        Declaration {
            backend: &mut *self.backend,
            program: self.program,
            binder: &mut self.polygon,
            units: &mut self.units,
        }
    }

    pub fn build(mut self) -> Shader<S, M, G, P> {
        self.built = true;
        debug!(
            "Shader '{}': {} scene, {} material, {} geometry, {} polygon bindings, {} texture units",
            self.label,
            self.scene.len(),
            self.material.len(),
            self.geometry.len(),
            self.polygon.len(),
            self.units.len()
        );
        Shader {
            label: mem::take(&mut self.label),
            program: self.program,
            scene: mem::replace(&mut self.scene, Binder::new(Tier::Scene)),
            material: mem::replace(&mut self.material, Binder::new(Tier::Material)),
            geometry: mem::replace(&mut self.geometry, Binder::new(Tier::Geometry)),
            polygon: mem::replace(&mut self.polygon, Binder::new(Tier::Polygon)),
            units: mem::take(&mut self.units),
            disposed: false,
        }
    }
}

impl<S, M, G, P> Drop for ShaderBuilder<'_, S, M, G, P> {
    fn drop(&mut self) {
        if !self.built {
            if let Err(err) = self.backend.destroy_program(self.program) {
                log::warn!("Shader '{}': failed to release program: {}", self.label, err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AttributeType, BufferHandle, DummyBackend, RecordedUniform};
    use glam::{Mat4, Vec3};

    struct Frame {
        view: Mat4,
        tint: Vec3,
    }

    const VERTEX: &str = "in vec3 points;\nuniform mat4 viewMatrix;\nvoid main() {}\n";
    const FRAGMENT: &str = "uniform vec3 tint;\n#if USE_MAP\nuniform sampler2D map;\n#endif\nvoid main() {}\n";

    fn source(use_map: bool) -> ShaderSource {
        ShaderSource::new(VERTEX, FRAGMENT).with_directives(Directives::new().with("USE_MAP", use_map))
    }

    #[test]
    fn test_scene_tier_uploads_in_order() {
        let mut backend = DummyBackend::new();
        let mut builder = ShaderBuilder::<Frame, (), (), BufferHandle>::new(&mut backend, "test", &source(false)).unwrap();
        builder
            .scene()
            .set_uniform("viewMatrix", uniform::mat4(|f: &Frame| f.view))
            .unwrap()
            .set_uniform("tint", uniform::vec3(|f: &Frame| f.tint))
            .unwrap();
        builder
            .polygon()
            .set_attribute("points", 3, AttributeType::Float, |b: &BufferHandle| Some(*b))
            .unwrap();
        let mut shader = builder.build();
        assert_eq!(shader.bindings(Tier::Scene), ["viewMatrix", "tint"]);

        let frame = Frame {
            view: Mat4::IDENTITY,
            tint: Vec3::new(0.5, 0.25, 1.0),
        };
        shader.activate(&mut backend);
        shader.bind_scene(&frame, &mut backend).unwrap();
        assert_eq!(
            backend.last_uniform("tint"),
            Some(&RecordedUniform::Floats(vec![0.5, 0.25, 1.0]))
        );
        shader.dispose(&mut backend).unwrap();
        assert_eq!(backend.live_programs(), 0);
    }

    #[test]
    fn test_directive_gates_declaration() {
        let mut backend = DummyBackend::new();
        let mut builder = ShaderBuilder::<(), ()>::new(&mut backend, "test", &source(false)).unwrap();
        let err = builder
            .scene()
            .set_uniform("map", uniform::texture(|_: &()| None))
            .err();
        assert!(matches!(err, Some(ShaderError::MissingLocation { .. })));
        drop(builder);
        assert_eq!(backend.live_programs(), 0);
    }

    #[test]
    fn test_compile_error_reports_window() {
        let mut backend = DummyBackend::new();
        let broken = ShaderSource::new(VERTEX, "void main() {}\n#error unsupported variant\n");
        let err = ShaderBuilder::<()>::new(&mut backend, "broken", &broken).err();
        match err {
            Some(ShaderError::Compilation { window, .. }) => {
                assert!(window.contains("#error unsupported variant"));
            }
            other => panic!("unexpected result: {:?}", other.map(|e| e.to_string())),
        }
    }
}
