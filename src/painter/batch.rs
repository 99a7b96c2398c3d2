use glam::Mat4;

use crate::backend::{BackendError, GraphicsBackend};
use crate::batch::BatchMap;
use crate::error::RenderError;
use crate::scene::Subject;
use crate::shader::Shader;
use crate::target::Target;

/// Draws subjects grouped by material
pub struct BatchPainter<S> {
    shader: Shader<S>,
}

impl<S> BatchPainter<S> {
    pub fn new(shader: Shader<S>) -> Self {
        Self { shader }
    }

    pub fn shader(&self) -> &Shader<S> {
        &self.shader
    }

    /// Scene tier once, material tier once per distinct material, geometry and polygon tiers per draw.
    pub fn paint(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        target: &Target,
        subjects: &[Subject],
        view: &Mat4,
        state: &S,
    ) -> Result<(), RenderError> {
        let batches = BatchMap::from_subjects(subjects, view);

        target.bind(backend);
        self.shader.activate(backend);
        self.shader.bind_scene(state, backend)?;

        for (material, entries) in batches.iter() {
            self.shader.bind_material(material, backend)?;
            for entry in entries {
                self.shader.bind_geometry(&entry.geometry(), backend)?;
                self.shader.bind_polygon(&entry.polygon, backend)?;
                entry.index_buffer.draw(backend);
            }
        }

        log::debug!(
            "BatchPainter '{}': {} materials, {} draws",
            self.shader.label(),
            batches.len(),
            batches.entry_count()
        );
        Ok(())
    }

    pub fn dispose(self, backend: &mut dyn GraphicsBackend) -> Result<(), BackendError> {
        self.shader.dispose(backend)
    }
}
