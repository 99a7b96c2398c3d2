//! Single-pass forward rendering
//!
//! Every light is uploaded as a uniform array and evaluated per fragment in
//! one material-batched pass. Lights beyond the configured limits are not drawn.

use glam::Vec3;

use super::surface::{declare_camera, SurfaceInputs};
use super::Pipeline;
use crate::backend::{ClearValues, GraphicsBackend, RenderState};
use crate::error::RenderResult;
use crate::painter::BatchPainter;
use crate::scene::{Scene, TransformState};
use crate::shader::{library, uniform, ShaderBuilder, ShaderSource};
use crate::target::Target;
use crate::RendererConfig;

const FRAGMENT: &str = r#"
uniform vec3 ambientColor;
uniform int directionalCount;
uniform vec3 directionalDirections[MAX_DIRECTIONAL_LIGHTS];
uniform vec3 directionalColors[MAX_DIRECTIONAL_LIGHTS];
uniform int pointCount;
uniform vec3 pointPositions[MAX_POINT_LIGHTS];
uniform vec3 pointColors[MAX_POINT_LIGHTS];
uniform float pointRadii[MAX_POINT_LIGHTS];

out vec4 fragColor;

void main() {
    vec3 normal = surfaceNormal();
    vec3 eye = normalize(-vViewPosition);
    float gloss = surfaceGloss();
    float exponent = surfaceShininess();

    vec3 diffuse = ambientColor;
    vec3 specular = vec3(0.0);
    for (int i = 0; i < MAX_DIRECTIONAL_LIGHTS; i++) {
        if (i >= directionalCount) {
            break;
        }
        vec2 r = reflectance(normal, eye, directionalDirections[i], gloss, exponent);
        diffuse += directionalColors[i] * r.x;
        specular += directionalColors[i] * r.y;
    }
    for (int i = 0; i < MAX_POINT_LIGHTS; i++) {
        if (i >= pointCount) {
            break;
        }
        vec3 toLight = pointPositions[i] - vViewPosition;
        float range = length(toLight);
        float falloff = attenuation(range, pointRadii[i]);
        vec2 r = reflectance(normal, eye, toLight / max(range, 1e-4), gloss, exponent);
        diffuse += pointColors[i] * r.x * falloff;
        specular += pointColors[i] * r.y * falloff;
    }

    fragColor = vec4(surfaceAlbedo() * diffuse + specular + surfaceEmissive(), 1.0);
}
"#;

/// Per-frame scene tier: camera, ambient and the uploaded lights in view space
#[derive(Debug, Clone, Default)]
struct ForwardFrame {
    camera: TransformState,
    ambient: Vec3,
    directional_directions: Vec<Vec3>,
    directional_colors: Vec<Vec3>,
    point_positions: Vec<Vec3>,
    point_colors: Vec<Vec3>,
    point_radii: Vec<f32>,
}

impl AsRef<TransformState> for ForwardFrame {
    fn as_ref(&self) -> &TransformState {
        &self.camera
    }
}

/// Forward rendering with lights as uniform arrays
pub struct ForwardPipeline {
    painter: BatchPainter<ForwardFrame>,
    max_directional: usize,
    max_point: usize,
}

impl ForwardPipeline {
    pub fn new(backend: &mut dyn GraphicsBackend, config: &RendererConfig) -> RenderResult<Self> {
        let max_directional = config.max_directional_lights as usize;
        let max_point = config.max_point_lights as usize;
        let inputs = SurfaceInputs::new(config.features)
            .with_albedo()
            .with_emissive()
            .with_specular()
            .with_normals();

        let directives = inputs
            .directives()
            .with("MAX_DIRECTIONAL_LIGHTS", config.max_directional_lights)
            .with("MAX_POINT_LIGHTS", config.max_point_lights);
        let source = ShaderSource::new(
            library::SURFACE_VERTEX,
            library::stage(&[library::SURFACE_MATERIAL, library::REFLECTANCE, FRAGMENT]),
        )
        .with_directives(directives);

        let mut builder = ShaderBuilder::<ForwardFrame>::new(backend, "forward", &source)?;
        {
            let mut scene = builder.scene();
            declare_camera(&mut scene)?;
            scene
                .set_uniform("ambientColor", uniform::vec3(|f: &ForwardFrame| f.ambient))?
                .set_uniform(
                    "directionalCount",
                    uniform::int(|f: &ForwardFrame| f.directional_directions.len() as i32),
                )?
                .set_uniform(
                    "directionalDirections",
                    uniform::vec3_array(max_directional, |f: &ForwardFrame| f.directional_directions.as_slice()),
                )?
                .set_uniform(
                    "directionalColors",
                    uniform::vec3_array(max_directional, |f: &ForwardFrame| f.directional_colors.as_slice()),
                )?
                .set_uniform(
                    "pointCount",
                    uniform::int(|f: &ForwardFrame| f.point_positions.len() as i32),
                )?
                .set_uniform(
                    "pointPositions",
                    uniform::vec3_array(max_point, |f: &ForwardFrame| f.point_positions.as_slice()),
                )?
                .set_uniform(
                    "pointColors",
                    uniform::vec3_array(max_point, |f: &ForwardFrame| f.point_colors.as_slice()),
                )?
                .set_uniform(
                    "pointRadii",
                    uniform::float_array(max_point, |f: &ForwardFrame| f.point_radii.as_slice()),
                )?;
        }
        inputs.declare(&mut builder)?;

        Ok(Self {
            painter: BatchPainter::new(builder.build()),
            max_directional,
            max_point,
        })
    }

    fn frame(&self, transform: &TransformState, scene: &Scene) -> ForwardFrame {
        if scene.directional_lights.len() > self.max_directional || scene.point_lights.len() > self.max_point {
            log::debug!(
                "Forward: drawing {}/{} directional and {}/{} point lights",
                scene.directional_lights.len().min(self.max_directional),
                scene.directional_lights.len(),
                scene.point_lights.len().min(self.max_point),
                scene.point_lights.len()
            );
        }

        let directional = scene.directional_lights.iter().take(self.max_directional);
        let point = scene.point_lights.iter().take(self.max_point);
        ForwardFrame {
            camera: *transform,
            ambient: scene.ambient,
            directional_directions: directional.clone().map(|l| l.view_direction(&transform.view)).collect(),
            directional_colors: directional.map(|l| l.color).collect(),
            point_positions: point.clone().map(|l| l.view_position(&transform.view)).collect(),
            point_colors: point.clone().map(|l| l.color).collect(),
            point_radii: point.map(|l| l.radius).collect(),
        }
    }
}

impl Pipeline for ForwardPipeline {
    fn name(&self) -> &str {
        "Forward"
    }

    fn process(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        target: &Target,
        transform: &TransformState,
        scene: &Scene,
    ) -> RenderResult<()> {
        let frame = self.frame(transform, scene);

        target.clear(backend, &ClearValues::color_depth([0.0, 0.0, 0.0, 1.0], 1.0));
        backend.set_render_state(&RenderState::opaque());
        self.painter
            .paint(backend, target, &scene.subjects, &transform.view, &frame)
    }

    fn resize(&mut self, _backend: &mut dyn GraphicsBackend, width: u32, height: u32) -> RenderResult<()> {
        log::debug!("Forward: resized to {}x{}", width, height);
        Ok(())
    }

    fn dispose(self: Box<Self>, backend: &mut dyn GraphicsBackend) -> RenderResult<()> {
        self.painter.dispose(backend)?;
        Ok(())
    }
}
