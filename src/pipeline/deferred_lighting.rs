//! Deferred lighting
//!
//! Passes per frame:
//! 1. Geometry: packed normal, packed shininess and gloss into one color
//!    attachment, plus depth.
//! 2. Light accumulation into a buffer cleared to white. Each light writes
//!    `exp2(-contribution)` and blends multiplicatively, so the buffer holds
//!    `exp2(-sum)` whatever the draw order. Contributions are clamped to
//!    [`MAX_LIGHT_CONTRIBUTION`] before the exponent.
//! 3. Material: the scene again, reading the accumulated light back with
//!    `-log2`, times albedo, plus ambient and emissive.

use glam::{Mat4, Vec2, Vec3};

use super::encoding::{MAX_LIGHT_CONTRIBUTION, MIN_LIGHT_SAMPLE};
use super::surface::{declare_camera, declare_points, SurfaceInputs, VolumeMesh};
use super::{Pipeline, Staged};
use crate::backend::*;
use crate::batch::GeometryState;
use crate::error::RenderResult;
use crate::painter::{BatchPainter, SinglePainter};
use crate::scene::{Scene, TransformState};
use crate::shader::{library, uniform, Directives, Shader, ShaderBuilder, ShaderSource};
use crate::target::{AttachmentSpec, Target};
use crate::RendererConfig;

const GEOMETRY_FRAGMENT: &str = r#"
out vec4 normalGloss;

void main() {
    normalGloss = vec4(encodeNormal(surfaceNormal()), encodeShininess(surfaceShininess()), surfaceGloss());
}
"#;

const LIGHT_FRAGMENT: &str = r#"
uniform sampler2D geometryBuffer;
uniform sampler2D depthBuffer;
uniform mat4 inverseProjection;
uniform vec2 viewportSize;
uniform vec3 lightColor;
#if POINT_LIGHT
uniform vec3 lightPosition;
uniform float lightRadius;
#else
uniform vec3 lightDirection;
#endif

out vec4 fragColor;

void main() {
    ivec2 texel = ivec2(gl_FragCoord.xy);
    float depth = texelFetch(depthBuffer, texel, 0).r;
    if (depth >= 1.0) {
        discard;
    }
    vec4 encoded = texelFetch(geometryBuffer, texel, 0);
    vec3 normal = decodeNormal(encoded.xy);
    vec3 position = viewPosition(inverseProjection, gl_FragCoord.xy, viewportSize, depth);
    vec3 eye = normalize(-position);
#if POINT_LIGHT
    vec3 toLight = lightPosition - position;
    float range = length(toLight);
    float falloff = attenuation(range, lightRadius);
    toLight /= max(range, 1e-4);
#else
    vec3 toLight = lightDirection;
    float falloff = 1.0;
#endif
    vec2 r = reflectance(normal, eye, toLight, encoded.w, decodeShininess(encoded.z));
    vec3 diffuse = lightColor * falloff * r.x;
    float specular = dot(lightColor, vec3(0.2126, 0.7152, 0.0722)) * falloff * r.y;
    fragColor = exp2(-clamp(vec4(diffuse, specular), 0.0, MAX_LIGHT_CONTRIBUTION));
}
"#;

const MATERIAL_FRAGMENT: &str = r#"
uniform sampler2D lightBuffer;
uniform vec3 ambientColor;

out vec4 fragColor;

void main() {
    vec4 sampled = texelFetch(lightBuffer, ivec2(gl_FragCoord.xy), 0);
    vec4 light = -log2(max(sampled, vec4(MIN_LIGHT_SAMPLE)));
    fragColor = vec4(surfaceAlbedo() * (ambientColor + light.rgb) + vec3(light.a) + surfaceEmissive(), 1.0);
}
"#;

/// Scene tier of the light accumulation passes
#[derive(Debug, Clone, Copy, Default)]
struct AccumulationFrame {
    camera: TransformState,
    inverse_projection: Mat4,
    viewport: Vec2,
    color: Vec3,
    direction: Vec3,
    position: Vec3,
    radius: f32,
    geometry: Option<TextureHandle>,
    depth: Option<TextureHandle>,
}

impl AsRef<TransformState> for AccumulationFrame {
    fn as_ref(&self) -> &TransformState {
        &self.camera
    }
}

/// Scene tier of the material pass
#[derive(Debug, Clone, Copy, Default)]
struct MaterialFrame {
    camera: TransformState,
    ambient: Vec3,
    light: Option<TextureHandle>,
}

impl AsRef<TransformState> for MaterialFrame {
    fn as_ref(&self) -> &TransformState {
        &self.camera
    }
}

/// Deferred lighting with multiplicative light accumulation
pub struct DeferredLightingPipeline {
    geometry: BatchPainter<TransformState>,
    directional: SinglePainter<AccumulationFrame>,
    point: SinglePainter<AccumulationFrame>,
    material: BatchPainter<MaterialFrame>,
    geometry_target: Target,
    light_target: Target,
    quad: VolumeMesh,
    sphere: VolumeMesh,
}

impl DeferredLightingPipeline {
    pub fn new(backend: &mut dyn GraphicsBackend, config: &RendererConfig) -> RenderResult<Self> {
        let (((((((((), geometry), directional), point), material), geometry_target), light_target), quad), sphere) =
            Staged::new()
                .then(backend, |backend| Self::geometry_shader(backend, config).map(BatchPainter::new))?
                .then(backend, |backend| Self::light_shader(backend, false).map(SinglePainter::new))?
                .then(backend, |backend| Self::light_shader(backend, true).map(SinglePainter::new))?
                .then(backend, |backend| Self::material_shader(backend, config).map(BatchPainter::new))?
                .then(backend, |backend| {
                    Ok(Target::offscreen(
                        backend,
                        "deferred_lighting.geometry",
                        config.width,
                        config.height,
                        &[AttachmentSpec::texture(TextureFormat::Rgba16Float)],
                        Some(AttachmentSpec::texture(TextureFormat::Depth24)),
                    )?)
                })?
                .then(backend, |backend| {
                    Ok(Target::offscreen(
                        backend,
                        "deferred_lighting.light",
                        config.width,
                        config.height,
                        &[AttachmentSpec::texture(TextureFormat::Rgba16Float)],
                        None,
                    )?)
                })?
                .then(backend, VolumeMesh::fullscreen_quad)?
                .then(backend, |backend| VolumeMesh::light_sphere(backend, config.light_sphere_segments))?
                .finish();

        Ok(Self {
            geometry,
            directional,
            point,
            material,
            geometry_target,
            light_target,
            quad,
            sphere,
        })
    }

    fn geometry_shader(
        backend: &mut dyn GraphicsBackend,
        config: &RendererConfig,
    ) -> RenderResult<Shader<TransformState>> {
        let inputs = SurfaceInputs::new(config.features).with_specular().with_normals();
        let source = ShaderSource::new(
            library::SURFACE_VERTEX,
            library::stage(&[
                library::SURFACE_MATERIAL,
                library::NORMAL_ENCODING,
                library::SHININESS_ENCODING,
                GEOMETRY_FRAGMENT,
            ]),
        )
        .with_directives(inputs.directives());

        let mut builder = ShaderBuilder::<TransformState>::new(backend, "deferred_lighting.geometry", &source)?;
        declare_camera(&mut builder.scene())?;
        inputs.declare(&mut builder)?;
        Ok(builder.build())
    }

    fn light_shader(backend: &mut dyn GraphicsBackend, point: bool) -> RenderResult<Shader<AccumulationFrame, ()>> {
        let vertex = if point {
            library::TRANSFORM_VERTEX
        } else {
            library::FULLSCREEN_VERTEX
        };
        let source = ShaderSource::new(
            vertex,
            library::stage(&[
                library::NORMAL_ENCODING,
                library::SHININESS_ENCODING,
                library::REFLECTANCE,
                library::VIEW_POSITION,
                LIGHT_FRAGMENT,
            ]),
        )
        .with_directives(
            Directives::new()
                .with("POINT_LIGHT", point)
                .with("MAX_LIGHT_CONTRIBUTION", MAX_LIGHT_CONTRIBUTION),
        );
        let label = if point {
            "deferred_lighting.point"
        } else {
            "deferred_lighting.directional"
        };

        let mut builder = ShaderBuilder::<AccumulationFrame, ()>::new(backend, label, &source)?;
        {
            let mut scene = builder.scene();
            if point {
                declare_camera(&mut scene)?;
            }
            scene
                .set_uniform("geometryBuffer", uniform::texture(|f: &AccumulationFrame| f.geometry))?
                .set_uniform("depthBuffer", uniform::texture(|f: &AccumulationFrame| f.depth))?
                .set_uniform(
                    "inverseProjection",
                    uniform::mat4(|f: &AccumulationFrame| f.inverse_projection),
                )?
                .set_uniform("viewportSize", uniform::vec2(|f: &AccumulationFrame| f.viewport))?
                .set_uniform("lightColor", uniform::vec3(|f: &AccumulationFrame| f.color))?;
            if point {
                scene
                    .set_uniform("lightPosition", uniform::vec3(|f: &AccumulationFrame| f.position))?
                    .set_uniform("lightRadius", uniform::float(|f: &AccumulationFrame| f.radius))?;
            } else {
                scene.set_uniform("lightDirection", uniform::vec3(|f: &AccumulationFrame| f.direction))?;
            }
        }
        if point {
            builder
                .geometry()
                .set_uniform("modelMatrix", uniform::mat4(|g: &GeometryState| g.world))?;
        }
        declare_points(&mut builder.polygon())?;
        Ok(builder.build())
    }

    fn material_shader(
        backend: &mut dyn GraphicsBackend,
        config: &RendererConfig,
    ) -> RenderResult<Shader<MaterialFrame>> {
        let inputs = SurfaceInputs::new(config.features).with_albedo().with_emissive();
        let source = ShaderSource::new(
            library::SURFACE_VERTEX,
            library::stage(&[library::SURFACE_MATERIAL, MATERIAL_FRAGMENT]),
        )
        .with_directives(inputs.directives().with("MIN_LIGHT_SAMPLE", MIN_LIGHT_SAMPLE));

        let mut builder = ShaderBuilder::<MaterialFrame>::new(backend, "deferred_lighting.material", &source)?;
        {
            let mut scene = builder.scene();
            declare_camera(&mut scene)?;
            scene
                .set_uniform("lightBuffer", uniform::texture(|f: &MaterialFrame| f.light))?
                .set_uniform("ambientColor", uniform::vec3(|f: &MaterialFrame| f.ambient))?;
        }
        inputs.declare(&mut builder)?;
        Ok(builder.build())
    }

    /// The light accumulation buffer, exposed for inspection.
    pub fn light_target(&self) -> &Target {
        &self.light_target
    }

    fn accumulation_frame(&self, transform: &TransformState) -> AccumulationFrame {
        AccumulationFrame {
            camera: *transform,
            inverse_projection: transform.projection.inverse(),
            viewport: Vec2::new(
                self.geometry_target.width() as f32,
                self.geometry_target.height() as f32,
            ),
            geometry: self.geometry_target.color_texture(0),
            depth: self.geometry_target.depth_texture(),
            ..Default::default()
        }
    }
}

impl Pipeline for DeferredLightingPipeline {
    fn name(&self) -> &str {
        "Deferred Lighting"
    }

    fn process(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        target: &Target,
        transform: &TransformState,
        scene: &Scene,
    ) -> RenderResult<()> {
        // Geometry
        self.geometry_target
            .clear(backend, &ClearValues::color_depth([0.5, 0.5, 1.0, 0.0], 1.0));
        backend.set_render_state(&RenderState::opaque());
        self.geometry
            .paint(backend, &self.geometry_target, &scene.subjects, &transform.view, transform)?;

        // Light accumulation
        self.light_target
            .clear(backend, &ClearValues::color([1.0, 1.0, 1.0, 1.0]));
        let multiplicative = RenderState::fullscreen().with_blend(BlendState::multiplicative());
        backend.set_render_state(&multiplicative);

        let mut frame = self.accumulation_frame(transform);
        let quad = [self.quad.subject(Mat4::IDENTITY)];
        for light in &scene.directional_lights {
            frame.color = light.color;
            frame.direction = light.view_direction(&transform.view);
            self.directional
                .paint(backend, &self.light_target, &quad, &transform.view, &frame)?;
        }

        backend.set_render_state(&multiplicative.with_cull(CullMode::Front));
        for light in &scene.point_lights {
            frame.color = light.color;
            frame.position = light.view_position(&transform.view);
            frame.radius = light.radius;
            let volume = [self.sphere.subject(light.volume_matrix())];
            self.point
                .paint(backend, &self.light_target, &volume, &transform.view, &frame)?;
        }
        log::debug!("Deferred Lighting: {} lights accumulated", scene.light_count());

        // Material
        target.clear(backend, &ClearValues::color_depth([0.0, 0.0, 0.0, 1.0], 1.0));
        backend.set_render_state(&RenderState::opaque());
        let material = MaterialFrame {
            camera: *transform,
            ambient: scene.ambient,
            light: self.light_target.color_texture(0),
        };
        self.material
            .paint(backend, target, &scene.subjects, &transform.view, &material)
    }

    fn resize(&mut self, backend: &mut dyn GraphicsBackend, width: u32, height: u32) -> RenderResult<()> {
        self.geometry_target.resize(backend, width, height)?;
        self.light_target.resize(backend, width, height)?;
        Ok(())
    }

    fn dispose(self: Box<Self>, backend: &mut dyn GraphicsBackend) -> RenderResult<()> {
        let this = *self;
        this.geometry.dispose(backend)?;
        this.directional.dispose(backend)?;
        this.point.dispose(backend)?;
        this.material.dispose(backend)?;
        this.geometry_target.dispose(backend)?;
        this.light_target.dispose(backend)?;
        this.quad.dispose(backend)?;
        this.sphere.dispose(backend)?;
        Ok(())
    }
}
