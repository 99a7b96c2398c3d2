//! Shader binding registry tests

mod common;

use std::sync::Arc;

use glam::{Mat4, Vec3};
use rstest::rstest;

use common::{camera, material, Fixture};
use lilium_renderer::backend::{AttributeType, BufferHandle, Command, DummyBackend, GraphicsBackend, TextureHandle};
use lilium_renderer::shader::{uniform, BindingKind, Directives};
use lilium_renderer::{
    create_pipeline, BindingError, DirectionalLight, Material, MaterialFeatures, PipelineKind, RenderError,
    RendererConfig, Scene, ShaderBuilder, ShaderError, ShaderSource, Target, Tier,
};

const VERTEX: &str = r#"
in vec3 points;
uniform mat4 viewMatrix;
uniform mat4 modelMatrix;
void main() {
    gl_Position = viewMatrix * modelMatrix * vec4(points, 1.0);
}
"#;

const FRAGMENT: &str = r#"
uniform sampler2D environmentMap;
uniform sampler2D detailMap;
uniform sampler2D maskMap;
uniform vec3 tint;
out vec4 fragColor;
void main() {
    fragColor = vec4(tint, 1.0) * texture(environmentMap, vec2(0.0)) * texture(detailMap, vec2(0.0))
        * texture(maskMap, vec2(0.0));
}
"#;

struct Frame {
    view: Mat4,
    environment: Option<TextureHandle>,
}

struct Surface {
    tint: Vec3,
    detail: Option<TextureHandle>,
}

type TestBuilder<'b> = ShaderBuilder<'b, Frame, Surface, Mat4, BufferHandle>;

fn builder(backend: &mut DummyBackend) -> TestBuilder<'_> {
    ShaderBuilder::new(backend, "binding-test", &ShaderSource::new(VERTEX, FRAGMENT)).unwrap()
}

#[rstest]
#[case(Tier::Scene)]
#[case(Tier::Material)]
#[case(Tier::Geometry)]
fn test_duplicate_uniform_in_one_tier(#[case] tier: Tier) {
    let mut backend = DummyBackend::new();
    let mut builder = builder(&mut backend);
    let err = match tier {
        Tier::Scene => builder
            .scene()
            .set_uniform("tint", uniform::vec3(|_: &Frame| Vec3::ONE))
            .and_then(|d| d.set_uniform("tint", uniform::vec3(|_: &Frame| Vec3::ZERO)))
            .err(),
        Tier::Material => builder
            .material()
            .set_uniform("tint", uniform::vec3(|s: &Surface| s.tint))
            .and_then(|d| d.set_uniform("tint", uniform::vec3(|s: &Surface| s.tint)))
            .err(),
        _ => builder
            .geometry()
            .set_uniform("modelMatrix", uniform::mat4(|m: &Mat4| *m))
            .and_then(|d| d.set_uniform("modelMatrix", uniform::mat4(|m: &Mat4| *m)))
            .err(),
    };
    match err {
        Some(ShaderError::DuplicateBinding { tier: reported, .. }) => assert_eq!(reported, tier),
        other => panic!("expected a duplicate binding, got {:?}", other),
    }
}

#[test]
fn test_duplicate_attribute() {
    let mut backend = DummyBackend::new();
    let mut builder = builder(&mut backend);
    let mut polygon = builder.polygon();
    polygon
        .set_attribute("points", 3, AttributeType::Float, |b: &BufferHandle| Some(*b))
        .unwrap();
    let err = polygon
        .set_attribute("points", 3, AttributeType::Float, |b: &BufferHandle| Some(*b))
        .err();
    assert_eq!(
        err,
        Some(ShaderError::DuplicateBinding {
            tier: Tier::Polygon,
            name: "points".to_string(),
        })
    );
}

#[test]
fn test_same_name_in_different_tiers_is_allowed() {
    let mut backend = DummyBackend::new();
    let mut builder = builder(&mut backend);
    builder
        .scene()
        .set_uniform("tint", uniform::vec3(|_: &Frame| Vec3::ONE))
        .unwrap();
    assert!(builder
        .material()
        .set_uniform("tint", uniform::vec3(|s: &Surface| s.tint))
        .is_ok());
}

#[rstest]
#[case("glossFactor", BindingKind::Uniform)]
#[case("normals", BindingKind::Attribute)]
fn test_missing_location(#[case] name: &str, #[case] kind: BindingKind) {
    let mut backend = DummyBackend::new();
    let mut builder = builder(&mut backend);
    let err = match kind {
        BindingKind::Uniform => builder
            .material()
            .set_uniform(name, uniform::float(|_: &Surface| 1.0))
            .err(),
        BindingKind::Attribute => builder
            .polygon()
            .set_attribute(name, 3, AttributeType::Float, |b: &BufferHandle| Some(*b))
            .err(),
    };
    let tier = match kind {
        BindingKind::Uniform => Tier::Material,
        BindingKind::Attribute => Tier::Polygon,
    };
    assert_eq!(
        err,
        Some(ShaderError::MissingLocation {
            tier,
            kind,
            name: name.to_string(),
        })
    );
}

#[test]
fn test_texture_units_follow_declaration_order_across_tiers() {
    let mut backend = DummyBackend::new();
    let environment = backend
        .create_texture(&Default::default(), None)
        .unwrap();
    let detail = backend.create_texture(&Default::default(), None).unwrap();

    let mut builder = builder(&mut backend);
    builder
        .scene()
        .set_uniform("environmentMap", uniform::texture(|f: &Frame| f.environment))
        .unwrap()
        .set_uniform("viewMatrix", uniform::mat4(|f: &Frame| f.view))
        .unwrap();
    builder
        .material()
        .set_uniform("detailMap", uniform::texture(|s: &Surface| s.detail))
        .unwrap()
        .set_uniform("tint", uniform::vec3(|s: &Surface| s.tint))
        .unwrap();
    builder
        .geometry()
        .set_uniform("maskMap", uniform::texture(|_: &Mat4| None))
        .unwrap();
    let mut shader = builder.build();

    let units = shader.texture_units();
    assert_eq!(units.unit_of("environmentMap"), Some(0));
    assert_eq!(units.unit_of("detailMap"), Some(1));
    assert_eq!(units.unit_of("maskMap"), Some(2));
    assert!(units.units().windows(2).all(|w| w[0].tier <= w[1].tier));

    shader.activate(&mut backend);
    shader
        .bind_scene(
            &Frame {
                view: Mat4::IDENTITY,
                environment: Some(environment),
            },
            &mut backend,
        )
        .unwrap();
    shader
        .bind_material(
            &Surface {
                tint: Vec3::ONE,
                detail: Some(detail),
            },
            &mut backend,
        )
        .unwrap();
    assert_eq!(backend.texture_bindings(), vec![(0, environment), (1, detail)]);

    // The geometry tier has no mask to offer
    let err = shader.bind_geometry(&Mat4::IDENTITY, &mut backend).err();
    assert_eq!(
        err,
        Some(BindingError::InvalidBinding {
            tier: Tier::Geometry,
            name: "maskMap".to_string(),
        })
    );
    shader.dispose(&mut backend).unwrap();
}

#[test]
fn test_tier_binds_in_declaration_order() {
    let mut backend = DummyBackend::new();
    let mut builder = builder(&mut backend);
    builder
        .scene()
        .set_uniform("viewMatrix", uniform::mat4(|f: &Frame| f.view))
        .unwrap()
        .set_uniform("environmentMap", uniform::texture(|f: &Frame| f.environment))
        .unwrap();
    let mut shader = builder.build();
    assert_eq!(shader.bindings(Tier::Scene), ["viewMatrix", "environmentMap"]);

    let environment = backend.create_texture(&Default::default(), None).unwrap();
    backend.take_commands();
    shader
        .bind_scene(
            &Frame {
                view: Mat4::IDENTITY,
                environment: Some(environment),
            },
            &mut backend,
        )
        .unwrap();
    let names: Vec<&str> = backend
        .commands()
        .iter()
        .filter_map(|c| match c {
            Command::SetUniform { name, .. } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(names, ["viewMatrix", "environmentMap"]);
    shader.dispose(&mut backend).unwrap();
}

#[test]
fn test_failed_declaration_releases_program() {
    let mut backend = DummyBackend::new();
    {
        let mut builder = builder(&mut backend);
        assert!(builder
            .scene()
            .set_uniform("missing", uniform::float(|_: &Frame| 0.0))
            .is_err());
    }
    assert_eq!(backend.live_programs(), 0);
}

#[test]
fn test_compile_error_names_offending_line() {
    let mut backend = DummyBackend::new();
    let fragment = "out vec4 fragColor;\n#if !USE_FALLBACK\n#error variant needs a fallback\n#endif\nvoid main() {}\n";
    let source = ShaderSource::new(VERTEX, fragment).with_directives(Directives::new().with("USE_FALLBACK", false));

    let err = ShaderBuilder::<()>::new(&mut backend, "variant", &source).err();
    match err {
        Some(ShaderError::Compilation { message, window, .. }) => {
            assert!(message.contains("variant needs a fallback"));
            assert!(window.lines().any(|l| l.starts_with('>') && l.contains("#error")));
            assert!(window.contains("#if !USE_FALLBACK"));
        }
        other => panic!("expected a compile error, got {:?}", other),
    }
    assert_eq!(backend.live_programs(), 0);
}

#[test]
fn test_material_missing_required_texture_fails_paint() {
    let mut fixture = Fixture::new();
    let config = RendererConfig::default()
        .with_size(320, 240)
        .with_features(MaterialFeatures::default().with_albedo_map());
    let mut pipeline = create_pipeline(&mut fixture.backend, &config).unwrap();

    let plain = material("untextured");
    let mut scene = Scene::new();
    scene.add_subject(fixture.subject(Vec3::ZERO, &[&plain]));

    let err = pipeline
        .process(&mut fixture.backend, &Target::default_framebuffer(320, 240), &camera(), &scene)
        .err();
    assert_eq!(
        err,
        Some(RenderError::Binding(BindingError::InvalidBinding {
            tier: Tier::Material,
            name: "albedoMap".to_string(),
        }))
    );
    assert_eq!(fixture.backend.draw_calls(), 0);
    pipeline.dispose(&mut fixture.backend).unwrap();
}

/// The single-map variant sampling the material uniform `map`.
fn map_variant(map: &str) -> MaterialFeatures {
    let features = MaterialFeatures::default();
    match map {
        "albedoMap" => features.with_albedo_map(),
        "normalMap" => features.with_normal_map(),
        "emissiveMap" => features.with_emissive_map(),
        "glossMap" => features.with_gloss_map(),
        other => panic!("no material map named {other}"),
    }
}

/// One lit subject, so every pass that reads the material tier draws it.
fn lit_scene(fixture: &Fixture, material: &Arc<Material>) -> Scene {
    let mut scene = Scene::new();
    scene.add_subject(fixture.subject(Vec3::ZERO, &[material]));
    scene.add_directional_light(DirectionalLight::new(Vec3::new(0.0, -1.0, -1.0), Vec3::ONE));
    scene
}

#[rstest]
fn test_textured_material_satisfies_map_variant(
    #[values(
        PipelineKind::Forward,
        PipelineKind::ForwardLighting,
        PipelineKind::DeferredShading,
        PipelineKind::DeferredLighting
    )]
    kind: PipelineKind,
    #[values("albedoMap", "normalMap", "emissiveMap", "glossMap")] map: &str,
) {
    let mut fixture = Fixture::new();
    let config = RendererConfig::default()
        .with_pipeline(kind)
        .with_size(320, 240)
        .with_features(map_variant(map));
    let mut pipeline = create_pipeline(&mut fixture.backend, &config).unwrap();

    let textured = fixture.material_with_maps("checker", map_variant(map));
    let scene = lit_scene(&fixture, &textured);

    pipeline
        .process(&mut fixture.backend, &Target::default_framebuffer(320, 240), &camera(), &scene)
        .unwrap();
    assert!(fixture.backend.uniform_uploads(map) >= 1);
    pipeline.dispose(&mut fixture.backend).unwrap();
}

#[rstest]
fn test_material_missing_variant_map_names_it(
    #[values(
        PipelineKind::Forward,
        PipelineKind::ForwardLighting,
        PipelineKind::DeferredShading,
        PipelineKind::DeferredLighting
    )]
    kind: PipelineKind,
    #[values("albedoMap", "normalMap", "emissiveMap", "glossMap")] map: &str,
) {
    let mut fixture = Fixture::new();
    let config = RendererConfig::default()
        .with_pipeline(kind)
        .with_size(320, 240)
        .with_features(map_variant(map));
    let mut pipeline = create_pipeline(&mut fixture.backend, &config).unwrap();

    let scene = lit_scene(&fixture, &material("untextured"));
    let err = pipeline
        .process(&mut fixture.backend, &Target::default_framebuffer(320, 240), &camera(), &scene)
        .err();
    assert_eq!(
        err,
        Some(RenderError::Binding(BindingError::InvalidBinding {
            tier: Tier::Material,
            name: map.to_string(),
        }))
    );
    pipeline.dispose(&mut fixture.backend).unwrap();
}
