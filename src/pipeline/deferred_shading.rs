//! Deferred shading
//!
//! Passes per frame:
//! 1. Geometry into the G-buffer: albedo and gloss, packed normal and
//!    shininess, emissive, depth.
//! 2. Ambient and emissive over the whole output.
//! 3. One additive pass per light, a full-screen quad for directional lights
//!    and a front-face-culled sphere for point lights.

use glam::{Mat4, Vec2, Vec3};

use super::surface::{declare_camera, declare_points, SurfaceInputs, VolumeMesh};
use super::{Pipeline, Staged};
use crate::backend::*;
use crate::batch::GeometryState;
use crate::error::RenderResult;
use crate::painter::{BatchPainter, SinglePainter};
use crate::scene::{Scene, TransformState};
use crate::shader::{library, uniform, Declaration, Directives, Shader, ShaderBuilder, ShaderSource};
use crate::target::{AttachmentSpec, Target};
use crate::RendererConfig;

const ALBEDO: usize = 0;
const NORMAL: usize = 1;
const EMISSIVE: usize = 2;

const GEOMETRY_FRAGMENT: &str = r#"
layout(location = 0) out vec4 albedoGloss;
layout(location = 1) out vec4 normalShininess;
layout(location = 2) out vec4 emissiveColor;

void main() {
    albedoGloss = vec4(surfaceAlbedo(), surfaceGloss());
    normalShininess = vec4(encodeNormal(surfaceNormal()), encodeShininess(surfaceShininess()), 1.0);
    emissiveColor = vec4(surfaceEmissive(), 1.0);
}
"#;

const AMBIENT_FRAGMENT: &str = r#"
uniform sampler2D albedoBuffer;
uniform sampler2D emissiveBuffer;
uniform vec3 ambientColor;

out vec4 fragColor;

void main() {
    ivec2 texel = ivec2(gl_FragCoord.xy);
    vec3 albedo = texelFetch(albedoBuffer, texel, 0).rgb;
    fragColor = vec4(albedo * ambientColor + texelFetch(emissiveBuffer, texel, 0).rgb, 1.0);
}
"#;

const LIGHT_FRAGMENT: &str = r#"
uniform sampler2D albedoBuffer;
uniform sampler2D normalBuffer;
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
    vec4 albedoGloss = texelFetch(albedoBuffer, texel, 0);
    vec4 encoded = texelFetch(normalBuffer, texel, 0);
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
    vec2 r = reflectance(normal, eye, toLight, albedoGloss.a, decodeShininess(encoded.z));
    fragColor = vec4(lightColor * falloff * (albedoGloss.rgb * r.x + r.y), 1.0);
}
"#;

/// Scene tier of the screen-space passes
#[derive(Debug, Clone, Copy, Default)]
struct ShadingFrame {
    camera: TransformState,
    inverse_projection: Mat4,
    viewport: Vec2,
    ambient: Vec3,
    color: Vec3,
    direction: Vec3,
    position: Vec3,
    radius: f32,
    albedo: Option<TextureHandle>,
    normal: Option<TextureHandle>,
    emissive: Option<TextureHandle>,
    depth: Option<TextureHandle>,
}

impl AsRef<TransformState> for ShadingFrame {
    fn as_ref(&self) -> &TransformState {
        &self.camera
    }
}

/// Deferred shading over a four-attachment G-buffer
pub struct DeferredShadingPipeline {
    geometry: BatchPainter<TransformState>,
    ambient: SinglePainter<ShadingFrame>,
    directional: SinglePainter<ShadingFrame>,
    point: SinglePainter<ShadingFrame>,
    gbuffer: Target,
    quad: VolumeMesh,
    sphere: VolumeMesh,
}

impl DeferredShadingPipeline {
    pub fn new(backend: &mut dyn GraphicsBackend, config: &RendererConfig) -> RenderResult<Self> {
        let ((((((((), geometry), ambient), directional), point), gbuffer), quad), sphere) = Staged::new()
            .then(backend, |backend| Self::geometry_shader(backend, config).map(BatchPainter::new))?
            .then(backend, |backend| Self::ambient_shader(backend).map(SinglePainter::new))?
            .then(backend, |backend| Self::light_shader(backend, false).map(SinglePainter::new))?
            .then(backend, |backend| Self::light_shader(backend, true).map(SinglePainter::new))?
            .then(backend, |backend| {
                Ok(Target::offscreen(
                    backend,
                    "deferred_shading.gbuffer",
                    config.width,
                    config.height,
                    &[
                        AttachmentSpec::texture(TextureFormat::Rgba8Unorm),
                        AttachmentSpec::texture(TextureFormat::Rgba16Float),
                        AttachmentSpec::texture(TextureFormat::Rgba8Unorm),
                    ],
                    Some(AttachmentSpec::texture(TextureFormat::Depth24)),
                )?)
            })?
            .then(backend, VolumeMesh::fullscreen_quad)?
            .then(backend, |backend| VolumeMesh::light_sphere(backend, config.light_sphere_segments))?
            .finish();

        Ok(Self {
            geometry,
            ambient,
            directional,
            point,
            gbuffer,
            quad,
            sphere,
        })
    }

    fn geometry_shader(
        backend: &mut dyn GraphicsBackend,
        config: &RendererConfig,
    ) -> RenderResult<Shader<TransformState>> {
        let inputs = SurfaceInputs::new(config.features)
            .with_albedo()
            .with_emissive()
            .with_specular()
            .with_normals();
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

        let mut builder = ShaderBuilder::<TransformState>::new(backend, "deferred_shading.geometry", &source)?;
        declare_camera(&mut builder.scene())?;
        inputs.declare(&mut builder)?;
        Ok(builder.build())
    }

    fn ambient_shader(backend: &mut dyn GraphicsBackend) -> RenderResult<Shader<ShadingFrame, ()>> {
        let source = ShaderSource::new(library::FULLSCREEN_VERTEX, AMBIENT_FRAGMENT);
        let mut builder = ShaderBuilder::<ShadingFrame, ()>::new(backend, "deferred_shading.ambient", &source)?;
        builder
            .scene()
            .set_uniform("albedoBuffer", uniform::texture(|f: &ShadingFrame| f.albedo))?
            .set_uniform("emissiveBuffer", uniform::texture(|f: &ShadingFrame| f.emissive))?
            .set_uniform("ambientColor", uniform::vec3(|f: &ShadingFrame| f.ambient))?;
        declare_points(&mut builder.polygon())?;
        Ok(builder.build())
    }

    fn light_shader(backend: &mut dyn GraphicsBackend, point: bool) -> RenderResult<Shader<ShadingFrame, ()>> {
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
        .with_directives(Directives::new().with("POINT_LIGHT", point));
        let label = if point {
            "deferred_shading.point"
        } else {
            "deferred_shading.directional"
        };

        let mut builder = ShaderBuilder::<ShadingFrame, ()>::new(backend, label, &source)?;
        {
            let mut scene = builder.scene();
            if point {
                declare_camera(&mut scene)?;
            }
            declare_light(&mut scene, point)?;
        }
        if point {
            builder
                .geometry()
                .set_uniform("modelMatrix", uniform::mat4(|g: &GeometryState| g.world))?;
        }
        declare_points(&mut builder.polygon())?;
        Ok(builder.build())
    }

    /// The G-buffer, exposed for inspection.
    pub fn gbuffer(&self) -> &Target {
        &self.gbuffer
    }

    fn frame(&self, transform: &TransformState, scene: &Scene) -> ShadingFrame {
        ShadingFrame {
            camera: *transform,
            inverse_projection: transform.projection.inverse(),
            viewport: Vec2::new(self.gbuffer.width() as f32, self.gbuffer.height() as f32),
            ambient: scene.ambient,
            albedo: self.gbuffer.color_texture(ALBEDO),
            normal: self.gbuffer.color_texture(NORMAL),
            emissive: self.gbuffer.color_texture(EMISSIVE),
            depth: self.gbuffer.depth_texture(),
            ..Default::default()
        }
    }
}

/// G-buffer samplers, screen reconstruction and light parameters.
fn declare_light(scene: &mut Declaration<'_, ShadingFrame>, point: bool) -> RenderResult<()> {
    scene
        .set_uniform("albedoBuffer", uniform::texture(|f: &ShadingFrame| f.albedo))?
        .set_uniform("normalBuffer", uniform::texture(|f: &ShadingFrame| f.normal))?
        .set_uniform("depthBuffer", uniform::texture(|f: &ShadingFrame| f.depth))?
        .set_uniform("inverseProjection", uniform::mat4(|f: &ShadingFrame| f.inverse_projection))?
        .set_uniform("viewportSize", uniform::vec2(|f: &ShadingFrame| f.viewport))?
        .set_uniform("lightColor", uniform::vec3(|f: &ShadingFrame| f.color))?;
    if point {
        scene
            .set_uniform("lightPosition", uniform::vec3(|f: &ShadingFrame| f.position))?
            .set_uniform("lightRadius", uniform::float(|f: &ShadingFrame| f.radius))?;
    } else {
        scene.set_uniform("lightDirection", uniform::vec3(|f: &ShadingFrame| f.direction))?;
    }
    Ok(())
}

impl Pipeline for DeferredShadingPipeline {
    fn name(&self) -> &str {
        "Deferred Shading"
    }

    fn process(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        target: &Target,
        transform: &TransformState,
        scene: &Scene,
    ) -> RenderResult<()> {
        // Geometry
        self.gbuffer
            .clear(backend, &ClearValues::color_depth([0.0, 0.0, 0.0, 0.0], 1.0));
        backend.set_render_state(&RenderState::opaque());
        self.geometry
            .paint(backend, &self.gbuffer, &scene.subjects, &transform.view, transform)?;

        // Ambient and emissive
        let mut frame = self.frame(transform, scene);
        let quad = [self.quad.subject(Mat4::IDENTITY)];
        target.clear(backend, &ClearValues::color_depth([0.0, 0.0, 0.0, 1.0], 1.0));
        backend.set_render_state(&RenderState::fullscreen());
        self.ambient
            .paint(backend, target, &quad, &transform.view, &frame)?;

        // Lights
        let additive = RenderState::fullscreen().with_blend(BlendState::additive());
        backend.set_render_state(&additive);
        for light in &scene.directional_lights {
            frame.color = light.color;
            frame.direction = light.view_direction(&transform.view);
            self.directional
                .paint(backend, target, &quad, &transform.view, &frame)?;
        }

        backend.set_render_state(&additive.with_cull(CullMode::Front));
        for light in &scene.point_lights {
            frame.color = light.color;
            frame.position = light.view_position(&transform.view);
            frame.radius = light.radius;
            let volume = [self.sphere.subject(light.volume_matrix())];
            self.point
                .paint(backend, target, &volume, &transform.view, &frame)?;
        }

        log::debug!(
            "Deferred Shading: {} directional, {} point light passes",
            scene.directional_lights.len(),
            scene.point_lights.len()
        );
        Ok(())
    }

    fn resize(&mut self, backend: &mut dyn GraphicsBackend, width: u32, height: u32) -> RenderResult<()> {
        self.gbuffer.resize(backend, width, height)?;
        Ok(())
    }

    fn dispose(self: Box<Self>, backend: &mut dyn GraphicsBackend) -> RenderResult<()> {
        let this = *self;
        this.geometry.dispose(backend)?;
        this.ambient.dispose(backend)?;
        this.directional.dispose(backend)?;
        this.point.dispose(backend)?;
        this.gbuffer.dispose(backend)?;
        this.quad.dispose(backend)?;
        this.sphere.dispose(backend)?;
        Ok(())
    }
}
