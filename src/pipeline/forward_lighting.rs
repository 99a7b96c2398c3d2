//! Shadow-mapped forward lighting
//!
//! Passes per frame:
//! 1. One depth-only pass per shadow-casting directional light into its own
//!    shadow map, seen through an orthographic light projection.
//! 2. Ambient and emissive terms into the output, writing depth.
//! 3. One additive pass per light over the same depth, `LessEqual` without
//!    writes. Casting directional lights use the shadowed variant; every
//!    other light never declares a shadow map.

use glam::{Mat4, Vec3};

use super::surface::{declare_camera, declare_points, SurfaceInputs};
use super::{Pipeline, Staged};
use crate::backend::*;
use crate::batch::GeometryState;
use crate::error::RenderResult;
use crate::painter::{BatchPainter, SinglePainter};
use crate::scene::{DirectionalLight, PointLight, Scene, TransformState};
use crate::shader::{library, uniform, Directives, Shader, ShaderBuilder, ShaderSource};
use crate::target::{AttachmentSpec, Target};
use crate::RendererConfig;

const AMBIENT_FRAGMENT: &str = r#"
uniform vec3 ambientColor;

out vec4 fragColor;

void main() {
    fragColor = vec4(surfaceAlbedo() * ambientColor + surfaceEmissive(), 1.0);
}
"#;

const LIGHT_FRAGMENT: &str = r#"
uniform vec3 lightColor;
#if POINT_LIGHT
uniform vec3 lightPosition;
uniform float lightRadius;
#else
uniform vec3 lightDirection;
#endif
#if USE_SHADOW
uniform sampler2D shadowMap;
uniform mat4 shadowMatrix;
uniform float shadowBias;
#endif

out vec4 fragColor;

void main() {
    vec3 normal = surfaceNormal();
    vec3 eye = normalize(-vViewPosition);
#if POINT_LIGHT
    vec3 toLight = lightPosition - vViewPosition;
    float range = length(toLight);
    float falloff = attenuation(range, lightRadius);
    toLight /= max(range, 1e-4);
#else
    vec3 toLight = lightDirection;
    float falloff = 1.0;
#endif
#if USE_SHADOW
    falloff *= shadowVisibility(shadowMap, shadowMatrix * vec4(vViewPosition, 1.0), shadowBias);
#endif
    vec2 r = reflectance(normal, eye, toLight, surfaceGloss(), surfaceShininess());
    fragColor = vec4(lightColor * falloff * (surfaceAlbedo() * r.x + r.y), 1.0);
}
"#;

/// Maps light clip space `[-1, 1]` to texture space `[0, 1]`.
fn texture_bias() -> Mat4 {
    Mat4::from_translation(Vec3::splat(0.5)) * Mat4::from_scale(Vec3::splat(0.5))
}

#[derive(Debug, Clone, Copy, Default)]
struct AmbientFrame {
    camera: TransformState,
    ambient: Vec3,
}

impl AsRef<TransformState> for AmbientFrame {
    fn as_ref(&self) -> &TransformState {
        &self.camera
    }
}

/// Scene tier of one additive light pass, positions and directions in view space
#[derive(Debug, Clone, Copy, Default)]
struct LightFrame {
    camera: TransformState,
    color: Vec3,
    direction: Vec3,
    position: Vec3,
    radius: f32,
    shadow_matrix: Mat4,
    shadow_map: Option<TextureHandle>,
    shadow_bias: f32,
}

impl AsRef<TransformState> for LightFrame {
    fn as_ref(&self) -> &TransformState {
        &self.camera
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LightVariant {
    Directional,
    DirectionalShadowed,
    Point,
}

impl LightVariant {
    fn label(self) -> &'static str {
        match self {
            LightVariant::Directional => "forward_lighting.directional",
            LightVariant::DirectionalShadowed => "forward_lighting.directional_shadowed",
            LightVariant::Point => "forward_lighting.point",
        }
    }
}

/// Forward rendering with per-light passes and directional shadow maps
pub struct ForwardLightingPipeline {
    shadow: SinglePainter<TransformState>,
    ambient: BatchPainter<AmbientFrame>,
    directional: BatchPainter<LightFrame>,
    directional_shadowed: BatchPainter<LightFrame>,
    point: BatchPainter<LightFrame>,
    shadow_maps: Vec<Target>,
    shadow_map_size: u32,
    shadow_projection: Mat4,
    shadow_bias: f32,
}

impl ForwardLightingPipeline {
    pub fn new(backend: &mut dyn GraphicsBackend, config: &RendererConfig) -> RenderResult<Self> {
        let ((((((), shadow), ambient), directional), directional_shadowed), point) = Staged::new()
            .then(backend, |backend| Self::shadow_shader(backend).map(SinglePainter::new))?
            .then(backend, |backend| Self::ambient_shader(backend, config).map(BatchPainter::new))?
            .then(backend, |backend| {
                Self::light_shader(backend, config, LightVariant::Directional).map(BatchPainter::new)
            })?
            .then(backend, |backend| {
                Self::light_shader(backend, config, LightVariant::DirectionalShadowed).map(BatchPainter::new)
            })?
            .then(backend, |backend| {
                Self::light_shader(backend, config, LightVariant::Point).map(BatchPainter::new)
            })?
            .finish();

        Ok(Self {
            shadow,
            ambient,
            directional,
            directional_shadowed,
            point,
            shadow_maps: Vec::new(),
            shadow_map_size: config.shadow_map_size,
            shadow_projection: DirectionalLight::shadow_projection(config.shadow_extent, config.shadow_depth_range),
            shadow_bias: config.shadow_bias,
        })
    }

    fn shadow_shader(backend: &mut dyn GraphicsBackend) -> RenderResult<Shader<TransformState, ()>> {
        let source = ShaderSource::new(library::TRANSFORM_VERTEX, library::DEPTH_FRAGMENT);
        let mut builder = ShaderBuilder::<TransformState, ()>::new(backend, "forward_lighting.shadow", &source)?;
        declare_camera(&mut builder.scene())?;
        builder
            .geometry()
            .set_uniform("modelMatrix", uniform::mat4(|g: &GeometryState| g.world))?;
        declare_points(&mut builder.polygon())?;
        Ok(builder.build())
    }

    fn ambient_shader(
        backend: &mut dyn GraphicsBackend,
        config: &RendererConfig,
    ) -> RenderResult<Shader<AmbientFrame>> {
        let inputs = SurfaceInputs::new(config.features).with_albedo().with_emissive();
        let source = ShaderSource::new(
            library::SURFACE_VERTEX,
            library::stage(&[library::SURFACE_MATERIAL, AMBIENT_FRAGMENT]),
        )
        .with_directives(inputs.directives());

        let mut builder = ShaderBuilder::<AmbientFrame>::new(backend, "forward_lighting.ambient", &source)?;
        {
            let mut scene = builder.scene();
            declare_camera(&mut scene)?;
            scene.set_uniform("ambientColor", uniform::vec3(|f: &AmbientFrame| f.ambient))?;
        }
        inputs.declare(&mut builder)?;
        Ok(builder.build())
    }

    fn light_shader(
        backend: &mut dyn GraphicsBackend,
        config: &RendererConfig,
        variant: LightVariant,
    ) -> RenderResult<Shader<LightFrame>> {
        let inputs = SurfaceInputs::new(config.features)
            .with_albedo()
            .with_specular()
            .with_normals();
        let shadowed = variant == LightVariant::DirectionalShadowed;
        let point = variant == LightVariant::Point;
        let directives = Directives::new()
            .with("POINT_LIGHT", point)
            .with("USE_SHADOW", shadowed);
        let source = ShaderSource::new(
            library::SURFACE_VERTEX,
            library::stage(&[
                library::SURFACE_MATERIAL,
                library::REFLECTANCE,
                library::SHADOW_TEST,
                LIGHT_FRAGMENT,
            ]),
        )
        .with_directives(inputs.directives())
        .with_directives(directives);

        let mut builder = ShaderBuilder::<LightFrame>::new(backend, variant.label(), &source)?;
        {
            let mut scene = builder.scene();
            declare_camera(&mut scene)?;
            scene.set_uniform("lightColor", uniform::vec3(|f: &LightFrame| f.color))?;
            if point {
                scene
                    .set_uniform("lightPosition", uniform::vec3(|f: &LightFrame| f.position))?
                    .set_uniform("lightRadius", uniform::float(|f: &LightFrame| f.radius))?;
            } else {
                scene.set_uniform("lightDirection", uniform::vec3(|f: &LightFrame| f.direction))?;
            }
            if shadowed {
                scene
                    .set_uniform("shadowMap", uniform::texture(|f: &LightFrame| f.shadow_map))?
                    .set_uniform("shadowMatrix", uniform::mat4(|f: &LightFrame| f.shadow_matrix))?
                    .set_uniform("shadowBias", uniform::float(|f: &LightFrame| f.shadow_bias))?;
            }
        }
        inputs.declare(&mut builder)?;
        Ok(builder.build())
    }

    /// Shadow maps currently allocated, one per casting light seen so far.
    pub fn shadow_map_count(&self) -> usize {
        self.shadow_maps.len()
    }

    fn ensure_shadow_maps(&mut self, backend: &mut dyn GraphicsBackend, count: usize) -> RenderResult<()> {
        while self.shadow_maps.len() < count {
            let label = format!("forward_lighting.shadow{}", self.shadow_maps.len());
            let target = Target::offscreen(
                backend,
                &label,
                self.shadow_map_size,
                self.shadow_map_size,
                &[],
                Some(AttachmentSpec::texture(TextureFormat::Depth24)),
            )?;
            self.shadow_maps.push(target);
        }
        Ok(())
    }

    fn light_space(&self, light: &DirectionalLight) -> TransformState {
        TransformState::new(self.shadow_projection, light.shadow_view())
    }

    fn directional_frame(&self, transform: &TransformState, light: &DirectionalLight) -> LightFrame {
        LightFrame {
            camera: *transform,
            color: light.color,
            direction: light.view_direction(&transform.view),
            shadow_bias: self.shadow_bias,
            ..Default::default()
        }
    }

    fn point_frame(&self, transform: &TransformState, light: &PointLight) -> LightFrame {
        LightFrame {
            camera: *transform,
            color: light.color,
            position: light.view_position(&transform.view),
            radius: light.radius,
            ..Default::default()
        }
    }
}

impl Pipeline for ForwardLightingPipeline {
    fn name(&self) -> &str {
        "Forward Lighting"
    }

    fn process(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        target: &Target,
        transform: &TransformState,
        scene: &Scene,
    ) -> RenderResult<()> {
        let casters: Vec<&DirectionalLight> = scene
            .directional_lights
            .iter()
            .filter(|light| light.casts_shadow)
            .collect();
        self.ensure_shadow_maps(backend, casters.len())?;

        // Shadow maps
        let shadow_state = RenderState::opaque().with_cull(CullMode::None);
        for (light, map) in casters.iter().zip(&self.shadow_maps) {
            let light_space = self.light_space(light);
            map.clear(backend, &ClearValues::depth(1.0));
            backend.set_render_state(&shadow_state);
            self.shadow
                .paint(backend, map, &scene.subjects, &light_space.view, &light_space)?;
        }
        log::debug!("Forward Lighting: {} shadow maps rendered", casters.len());

        // Ambient and emissive
        target.clear(backend, &ClearValues::color_depth([0.0, 0.0, 0.0, 1.0], 1.0));
        backend.set_render_state(&RenderState::opaque());
        let ambient = AmbientFrame {
            camera: *transform,
            ambient: scene.ambient,
        };
        self.ambient
            .paint(backend, target, &scene.subjects, &transform.view, &ambient)?;

        // Lights
        backend.set_render_state(
            &RenderState::opaque()
                .with_depth(DepthState::read_only(CompareFunction::LessEqual))
                .with_blend(BlendState::additive()),
        );
        let camera_inverse = transform.view.inverse();
        let mut caster = 0;
        for light in &scene.directional_lights {
            let mut frame = self.directional_frame(transform, light);
            if light.casts_shadow {
                let light_space = self.light_space(light);
                frame.shadow_matrix = texture_bias() * light_space.view_projection() * camera_inverse;
                frame.shadow_map = self.shadow_maps.get(caster).and_then(Target::depth_texture);
                caster += 1;
                self.directional_shadowed
                    .paint(backend, target, &scene.subjects, &transform.view, &frame)?;
            } else {
                self.directional
                    .paint(backend, target, &scene.subjects, &transform.view, &frame)?;
            }
        }
        for light in &scene.point_lights {
            let frame = self.point_frame(transform, light);
            self.point
                .paint(backend, target, &scene.subjects, &transform.view, &frame)?;
        }
        log::debug!("Forward Lighting: {} light passes", scene.light_count());
        Ok(())
    }

    fn resize(&mut self, _backend: &mut dyn GraphicsBackend, width: u32, height: u32) -> RenderResult<()> {
        log::debug!("Forward Lighting: resized to {}x{}", width, height);
        Ok(())
    }

    fn dispose(self: Box<Self>, backend: &mut dyn GraphicsBackend) -> RenderResult<()> {
        let this = *self;
        this.shadow.dispose(backend)?;
        this.ambient.dispose(backend)?;
        this.directional.dispose(backend)?;
        this.directional_shadowed.dispose(backend)?;
        this.point.dispose(backend)?;
        for map in this.shadow_maps {
            map.dispose(backend)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_bias_maps_clip_to_unit() {
        let bias = texture_bias();
        assert!((bias.transform_point3(Vec3::splat(-1.0)) - Vec3::ZERO).length() < 1e-6);
        assert!((bias.transform_point3(Vec3::ONE) - Vec3::ONE).length() < 1e-6);
    }
}
