use glam::Mat4;

use crate::backend::{BackendError, GraphicsBackend};
use crate::batch::{self, GeometryState};
use crate::error::RenderError;
use crate::scene::{Primitive, Subject};
use crate::shader::Shader;
use crate::target::Target;

/// Draws subjects one primitive at a time, without a material tier
pub struct SinglePainter<S> {
    shader: Shader<S, ()>,
}

impl<S> SinglePainter<S> {
    pub fn new(shader: Shader<S, ()>) -> Self {
        Self { shader }
    }

    pub fn shader(&self) -> &Shader<S, ()> {
        &self.shader
    }

    pub fn paint(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        target: &Target,
        subjects: &[Subject],
        view: &Mat4,
        state: &S,
    ) -> Result<(), RenderError> {
        target.bind(backend);
        self.shader.activate(backend);
        self.shader.bind_scene(state, backend)?;

        let shader = &mut self.shader;
        let mut draws = 0usize;
        for subject in subjects {
            for node in &subject.model.meshes {
                let mut draw = |primitive: &Primitive, geometry: &GeometryState| {
                    shader.bind_geometry(geometry, backend)?;
                    shader.bind_polygon(&primitive.polygon, backend)?;
                    primitive.index_buffer.draw(backend);
                    draws += 1;
                    Ok::<(), RenderError>(())
                };
                batch::visit(view, &subject.transform, node, &mut draw)?;
            }
        }
        log::trace!("SinglePainter '{}': {} draws", self.shader.label(), draws);
        Ok(())
    }

    pub fn dispose(self, backend: &mut dyn GraphicsBackend) -> Result<(), BackendError> {
        self.shader.dispose(backend)
    }
}
