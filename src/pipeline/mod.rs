//! Rendering pipelines
//!
//! A pipeline owns its shaders, painters and intermediate targets and runs a
//! fixed sequence of passes per frame:
//!
//! - [`ForwardPipeline`]: one material-batched pass, lights as uniform arrays.
//! - [`ForwardLightingPipeline`]: shadow maps, an ambient pass, then one
//!   additive pass per light.
//! - [`DeferredShadingPipeline`]: G-buffer, then screen-space ambient and
//!   per-light passes.
//! - [`DeferredLightingPipeline`]: normal/gloss buffer, multiplicative light
//!   accumulation, then a second material pass.
//!
//! A binding failure in any pass abandons the frame.

pub mod deferred_lighting;
pub mod deferred_shading;
pub mod encoding;
pub mod forward;
pub mod forward_lighting;
mod surface;

pub use deferred_lighting::DeferredLightingPipeline;
pub use deferred_shading::DeferredShadingPipeline;
pub use forward::ForwardPipeline;
pub use forward_lighting::ForwardLightingPipeline;
pub use surface::{SurfaceInputs, VolumeMesh};

use crate::backend::GraphicsBackend;
use crate::error::RenderResult;
use crate::painter::{BatchPainter, SinglePainter};
use crate::scene::{Scene, TransformState};
use crate::target::Target;
use crate::{PipelineKind, RendererConfig};

/// A named rendering algorithm
pub trait Pipeline {
    fn name(&self) -> &str;

    /// Render `scene` seen through `transform` into `target`.
    fn process(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        target: &Target,
        transform: &TransformState,
        scene: &Scene,
    ) -> RenderResult<()>;

    /// Recreate size-dependent targets.
    fn resize(&mut self, backend: &mut dyn GraphicsBackend, width: u32, height: u32) -> RenderResult<()>;

    /// Release every shader, mesh and target the pipeline owns.
    fn dispose(self: Box<Self>, backend: &mut dyn GraphicsBackend) -> RenderResult<()>;
}

/// Native state a pipeline owns
pub(crate) trait Release {
    fn release(self, backend: &mut dyn GraphicsBackend) -> RenderResult<()>;
}

impl Release for () {
    fn release(self, _backend: &mut dyn GraphicsBackend) -> RenderResult<()> {
        Ok(())
    }
}

/// Newest part first. Every part is released even when an earlier release fails.
impl<A: Release, B: Release> Release for (A, B) {
    fn release(self, backend: &mut dyn GraphicsBackend) -> RenderResult<()> {
        let (built, last) = self;
        let result = last.release(backend);
        built.release(backend).and(result)
    }
}

impl<S> Release for SinglePainter<S> {
    fn release(self, backend: &mut dyn GraphicsBackend) -> RenderResult<()> {
        Ok(self.dispose(backend)?)
    }
}

impl<S> Release for BatchPainter<S> {
    fn release(self, backend: &mut dyn GraphicsBackend) -> RenderResult<()> {
        Ok(self.dispose(backend)?)
    }
}

impl Release for Target {
    fn release(self, backend: &mut dyn GraphicsBackend) -> RenderResult<()> {
        Ok(self.dispose(backend)?)
    }
}

impl Release for VolumeMesh {
    fn release(self, backend: &mut dyn GraphicsBackend) -> RenderResult<()> {
        self.dispose(backend)
    }
}

/// Parts of a pipeline under construction
///
/// Each [`then`](Self::then) step appends one part. A failing step releases
/// everything built so far and returns its own error, so a constructor that
/// bails out leaves no native objects behind.
pub(crate) struct Staged<B>(B);

impl Staged<()> {
    pub(crate) fn new() -> Self {
        Staged(())
    }
}

impl<B: Release> Staged<B> {
    pub(crate) fn then<T: Release>(
        self,
        backend: &mut dyn GraphicsBackend,
        build: impl FnOnce(&mut dyn GraphicsBackend) -> RenderResult<T>,
    ) -> RenderResult<Staged<(B, T)>> {
        match build(backend) {
            Ok(part) => Ok(Staged((self.0, part))),
            Err(err) => {
                if let Err(cleanup) = self.0.release(backend) {
                    log::warn!("Failed to release a partially built pipeline: {}", cleanup);
                }
                Err(err)
            }
        }
    }

    /// The parts, oldest innermost.
    pub(crate) fn finish(self) -> B {
        self.0
    }
}

/// Build the pipeline `config.pipeline` names.
pub fn create_pipeline(
    backend: &mut dyn GraphicsBackend,
    config: &RendererConfig,
) -> RenderResult<Box<dyn Pipeline>> {
    config.validate()?;
    let pipeline: Box<dyn Pipeline> = match config.pipeline {
        PipelineKind::Forward => Box::new(ForwardPipeline::new(backend, config)?),
        PipelineKind::ForwardLighting => Box::new(ForwardLightingPipeline::new(backend, config)?),
        PipelineKind::DeferredShading => Box::new(DeferredShadingPipeline::new(backend, config)?),
        PipelineKind::DeferredLighting => Box::new(DeferredLightingPipeline::new(backend, config)?),
    };
    log::info!(
        "Created {} pipeline ({}x{}) on {}",
        pipeline.name(),
        config.width,
        config.height,
        backend.name()
    );
    Ok(pipeline)
}
