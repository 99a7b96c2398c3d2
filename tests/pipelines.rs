//! Frame-level tests for the four pipelines, run on the dummy backend.

mod common;

use glam::Vec3;
use rstest::rstest;

use common::{camera, material, Fixture};
use lilium_renderer::backend::{
    BlendState, ClearValues, Command, CullMode, DummyBackend, RecordedUniform, RenderState,
};
use lilium_renderer::pipeline::{DeferredLightingPipeline, DeferredShadingPipeline, ForwardLightingPipeline};
use lilium_renderer::{
    create_pipeline, DirectionalLight, Pipeline, PipelineKind, PointLight, RenderError, RendererConfig, Scene,
    Target,
};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;

fn config(kind: PipelineKind) -> RendererConfig {
    RendererConfig {
        shadow_map_size: 256,
        light_sphere_segments: 8,
        ..RendererConfig::default().with_pipeline(kind).with_size(WIDTH, HEIGHT)
    }
}

fn output() -> Target {
    Target::default_framebuffer(WIDTH, HEIGHT)
}

/// `primitives` cubes sharing one material, lit by `directional` lights (the first `casters` casting) and `point` lights.
fn scene(fixture: &Fixture, primitives: usize, directional: usize, casters: usize, point: usize) -> Scene {
    let plastic = material("plastic");
    let picks = vec![&plastic; primitives];
    let mut scene = Scene::new().with_ambient(Vec3::splat(0.1));
    scene.add_subject(fixture.subject(Vec3::ZERO, &picks));
    for i in 0..directional {
        let direction = Vec3::new(i as f32 - 1.0, -1.0, -0.5);
        scene.add_directional_light(DirectionalLight::new(direction, Vec3::ONE).with_shadow(i < casters));
    }
    for i in 0..point {
        scene.add_point_light(PointLight::new(Vec3::new(i as f32, 2.0, 0.0), Vec3::new(1.0, 0.8, 0.6), 4.0));
    }
    scene
}

fn render_states(backend: &DummyBackend) -> Vec<RenderState> {
    backend
        .commands()
        .iter()
        .filter_map(|c| match c {
            Command::SetRenderState(state) => Some(*state),
            _ => None,
        })
        .collect()
}

fn clears(backend: &DummyBackend) -> Vec<ClearValues> {
    backend
        .commands()
        .iter()
        .filter_map(|c| match c {
            Command::Clear(values) => Some(*values),
            _ => None,
        })
        .collect()
}

#[rstest]
#[case::forward(PipelineKind::Forward, 3, 2, 1, 2, 3)]
#[case::forward_lighting(PipelineKind::ForwardLighting, 3, 2, 1, 2, 3 + 3 + 4 * 3)]
#[case::forward_lighting_no_casters(PipelineKind::ForwardLighting, 2, 1, 0, 1, 2 + 2 * 2)]
#[case::deferred_shading(PipelineKind::DeferredShading, 3, 2, 1, 2, 3 + 1 + 2 + 2)]
#[case::deferred_lighting(PipelineKind::DeferredLighting, 3, 2, 1, 2, 3 + 2 + 2 + 3)]
fn test_draw_count(
    #[case] kind: PipelineKind,
    #[case] primitives: usize,
    #[case] directional: usize,
    #[case] casters: usize,
    #[case] point: usize,
    #[case] expected: usize,
) {
    let mut fixture = Fixture::new();
    let scene = scene(&fixture, primitives, directional, casters, point);
    let mut pipeline = create_pipeline(&mut fixture.backend, &config(kind)).unwrap();

    pipeline
        .process(&mut fixture.backend, &output(), &camera(), &scene)
        .unwrap();
    assert_eq!(fixture.backend.draw_calls(), expected, "{}", pipeline.name());
    pipeline.dispose(&mut fixture.backend).unwrap();
}

#[rstest]
#[case(PipelineKind::Forward)]
#[case(PipelineKind::ForwardLighting)]
#[case(PipelineKind::DeferredShading)]
#[case(PipelineKind::DeferredLighting)]
fn test_empty_scene_renders(#[case] kind: PipelineKind) {
    let mut fixture = Fixture::new();
    let mut pipeline = create_pipeline(&mut fixture.backend, &config(kind)).unwrap();

    pipeline
        .process(&mut fixture.backend, &output(), &camera(), &Scene::new())
        .unwrap();
    // Deferred shading still resolves the ambient term over the whole screen
    let expected = usize::from(kind == PipelineKind::DeferredShading);
    assert_eq!(fixture.backend.draw_calls(), expected);
    pipeline.dispose(&mut fixture.backend).unwrap();
}

#[test]
fn test_non_casting_lights_never_sample_shadow_maps() {
    let mut fixture = Fixture::new();
    let scene = scene(&fixture, 2, 3, 0, 1);
    let mut pipeline = ForwardLightingPipeline::new(&mut fixture.backend, &config(PipelineKind::ForwardLighting)).unwrap();

    pipeline
        .process(&mut fixture.backend, &output(), &camera(), &scene)
        .unwrap();
    assert_eq!(pipeline.shadow_map_count(), 0);
    assert_eq!(fixture.backend.uniform_uploads("shadowMap"), 0);
    assert_eq!(fixture.backend.uniform_uploads("shadowMatrix"), 0);
    Box::new(pipeline).dispose(&mut fixture.backend).unwrap();
}

#[test]
fn test_shadow_maps_only_for_casting_lights() {
    let mut fixture = Fixture::new();
    let mut scene = scene(&fixture, 2, 0, 0, 0);
    scene.add_directional_light(DirectionalLight::new(-Vec3::Y, Vec3::ONE));
    scene.add_directional_light(DirectionalLight::new(Vec3::new(-1.0, -1.0, 0.0), Vec3::ONE).with_shadow(true));
    scene.add_directional_light(DirectionalLight::new(Vec3::new(1.0, -1.0, 0.0), Vec3::ONE));
    let mut pipeline = ForwardLightingPipeline::new(&mut fixture.backend, &config(PipelineKind::ForwardLighting)).unwrap();

    pipeline
        .process(&mut fixture.backend, &output(), &camera(), &scene)
        .unwrap();
    assert_eq!(pipeline.shadow_map_count(), 1);
    // One scene-tier bind for the single casting light
    assert_eq!(fixture.backend.uniform_uploads("shadowMap"), 1);
    assert_eq!(fixture.backend.uniform_uploads("shadowMatrix"), 1);

    // Shadow maps persist across frames and grow with the caster count
    scene.directional_lights[0].casts_shadow = true;
    pipeline
        .process(&mut fixture.backend, &output(), &camera(), &scene)
        .unwrap();
    assert_eq!(pipeline.shadow_map_count(), 2);
    Box::new(pipeline).dispose(&mut fixture.backend).unwrap();
    assert_eq!(fixture.backend.live_framebuffers(), 0);
}

#[test]
fn test_shadow_pass_renders_both_faces() {
    let mut fixture = Fixture::new();
    let scene = scene(&fixture, 1, 1, 1, 0);
    let mut pipeline = create_pipeline(&mut fixture.backend, &config(PipelineKind::ForwardLighting)).unwrap();

    pipeline
        .process(&mut fixture.backend, &output(), &camera(), &scene)
        .unwrap();
    let states = render_states(&fixture.backend);
    assert_eq!(states.first(), Some(&RenderState::opaque().with_cull(CullMode::None)));
    assert!(states.iter().any(|s| s.blend == Some(BlendState::additive())));
    pipeline.dispose(&mut fixture.backend).unwrap();
}

#[test]
fn test_deferred_lighting_accumulates_multiplicatively() {
    let mut fixture = Fixture::new();
    let scene = scene(&fixture, 1, 1, 0, 1);
    let mut pipeline = create_pipeline(&mut fixture.backend, &config(PipelineKind::DeferredLighting)).unwrap();

    pipeline
        .process(&mut fixture.backend, &output(), &camera(), &scene)
        .unwrap();
    assert!(clears(&fixture.backend).contains(&ClearValues::color([1.0, 1.0, 1.0, 1.0])));
    let accumulation: Vec<RenderState> = render_states(&fixture.backend)
        .into_iter()
        .filter(|s| s.blend == Some(BlendState::multiplicative()))
        .collect();
    assert_eq!(accumulation.len(), 2);
    assert!(accumulation.iter().all(|s| s.depth.compare.is_none()));
    assert_eq!(accumulation[1].cull, CullMode::Front);
    pipeline.dispose(&mut fixture.backend).unwrap();
}

#[test]
fn test_point_volumes_cull_front_faces() {
    let mut fixture = Fixture::new();
    let scene = scene(&fixture, 1, 0, 0, 2);
    let mut pipeline = create_pipeline(&mut fixture.backend, &config(PipelineKind::DeferredShading)).unwrap();

    pipeline
        .process(&mut fixture.backend, &output(), &camera(), &scene)
        .unwrap();
    let front = RenderState::fullscreen()
        .with_blend(BlendState::additive())
        .with_cull(CullMode::Front);
    assert_eq!(render_states(&fixture.backend).last(), Some(&front));

    // The last volume sits on the last light
    let expected = scene.point_lights[1].volume_matrix().to_cols_array().to_vec();
    assert_eq!(
        fixture.backend.last_uniform("modelMatrix"),
        Some(&RecordedUniform::Floats(expected))
    );
    pipeline.dispose(&mut fixture.backend).unwrap();
}

#[test]
fn test_forward_ignores_lights_beyond_limit() {
    let mut fixture = Fixture::new();
    let scene = scene(&fixture, 1, 5, 0, 3);
    let config = RendererConfig {
        max_directional_lights: 2,
        max_point_lights: 1,
        ..config(PipelineKind::Forward)
    };
    let mut pipeline = create_pipeline(&mut fixture.backend, &config).unwrap();

    pipeline
        .process(&mut fixture.backend, &output(), &camera(), &scene)
        .unwrap();
    assert_eq!(
        fixture.backend.last_uniform("directionalCount"),
        Some(&RecordedUniform::Ints(vec![2]))
    );
    assert_eq!(
        fixture.backend.last_uniform("pointCount"),
        Some(&RecordedUniform::Ints(vec![1]))
    );
    match fixture.backend.last_uniform("directionalColors") {
        Some(RecordedUniform::Floats(values)) => assert_eq!(values.len(), 2 * 3),
        other => panic!("unexpected upload {:?}", other),
    }
    pipeline.dispose(&mut fixture.backend).unwrap();
}

#[test]
fn test_resize_recreates_gbuffer() {
    let mut fixture = Fixture::new();
    let mut pipeline = DeferredShadingPipeline::new(&mut fixture.backend, &config(PipelineKind::DeferredShading)).unwrap();
    let textures = fixture.backend.live_textures();
    let albedo = pipeline.gbuffer().color_texture(0);

    pipeline.resize(&mut fixture.backend, 640, 480).unwrap();
    assert_eq!(pipeline.gbuffer().width(), 640);
    assert_eq!(pipeline.gbuffer().height(), 480);
    assert_eq!(fixture.backend.live_textures(), textures);
    assert_ne!(pipeline.gbuffer().color_texture(0), albedo);

    let scene = scene(&fixture, 1, 1, 0, 0);
    pipeline
        .process(&mut fixture.backend, &Target::default_framebuffer(640, 480), &camera(), &scene)
        .unwrap();
    match fixture.backend.last_uniform("viewportSize") {
        Some(RecordedUniform::Floats(size)) => assert_eq!(size, &vec![640.0, 480.0]),
        other => panic!("unexpected upload {:?}", other),
    }
    Box::new(pipeline).dispose(&mut fixture.backend).unwrap();
}

#[test]
fn test_resize_recreates_light_buffer() {
    let mut fixture = Fixture::new();
    let mut pipeline =
        DeferredLightingPipeline::new(&mut fixture.backend, &config(PipelineKind::DeferredLighting)).unwrap();
    let framebuffers = fixture.backend.live_framebuffers();

    pipeline.resize(&mut fixture.backend, 100, 50).unwrap();
    assert_eq!(pipeline.light_target().width(), 100);
    assert_eq!(pipeline.light_target().height(), 50);
    assert_eq!(fixture.backend.live_framebuffers(), framebuffers);
    Box::new(pipeline).dispose(&mut fixture.backend).unwrap();
}

#[test]
fn test_fullscreen_pass_reads_only_its_own_streams() {
    let mut fixture = Fixture::new();
    let scene = scene(&fixture, 2, 0, 0, 0);
    let mut pipeline = create_pipeline(&mut fixture.backend, &config(PipelineKind::DeferredShading)).unwrap();

    pipeline
        .process(&mut fixture.backend, &output(), &camera(), &scene)
        .unwrap();
    // The G-buffer pass fed normals, the ambient quad after it only points
    assert_eq!(fixture.backend.enabled_attributes().len(), 1);
    pipeline.dispose(&mut fixture.backend).unwrap();
}

#[rstest]
#[case(PipelineKind::Forward)]
#[case(PipelineKind::ForwardLighting)]
#[case(PipelineKind::DeferredShading)]
#[case(PipelineKind::DeferredLighting)]
fn test_dispose_releases_everything(#[case] kind: PipelineKind) {
    let mut fixture = Fixture::new();
    let scene = scene(&fixture, 2, 2, 1, 1);
    let buffers = fixture.backend.live_buffers();
    let mut pipeline = create_pipeline(&mut fixture.backend, &config(kind)).unwrap();
    assert!(fixture.backend.live_programs() > 0);

    pipeline
        .process(&mut fixture.backend, &output(), &camera(), &scene)
        .unwrap();
    pipeline.dispose(&mut fixture.backend).unwrap();

    assert_eq!(fixture.backend.live_programs(), 0);
    assert_eq!(fixture.backend.live_textures(), 0);
    assert_eq!(fixture.backend.live_renderbuffers(), 0);
    assert_eq!(fixture.backend.live_framebuffers(), 0);
    assert_eq!(fixture.backend.live_buffers(), buffers);
}

#[rstest]
#[case(PipelineKind::Forward)]
#[case(PipelineKind::ForwardLighting)]
#[case(PipelineKind::DeferredShading)]
#[case(PipelineKind::DeferredLighting)]
fn test_failed_construction_releases_built_parts(#[case] kind: PipelineKind) {
    let mut failures = 0;
    let mut budget = 0;
    loop {
        let mut backend = DummyBackend::new();
        backend.fail_allocations_after(budget);
        match create_pipeline(&mut backend, &config(kind)) {
            Ok(pipeline) => {
                pipeline.dispose(&mut backend).unwrap();
                break;
            }
            Err(err) => {
                assert!(matches!(err, RenderError::Backend(_) | RenderError::Shader(_)));
                let live = (
                    backend.live_programs(),
                    backend.live_textures(),
                    backend.live_buffers(),
                    backend.live_renderbuffers(),
                    backend.live_framebuffers(),
                );
                assert_eq!(live, (0, 0, 0, 0, 0), "allocation budget {budget}");
                failures += 1;
            }
        }
        budget += 1;
        assert!(budget < 256, "{:?} never finished building", kind);
    }
    assert_eq!(failures, budget);
    assert!(failures > 0);
}

#[rstest]
#[case::empty_output(RendererConfig { width: 0, ..RendererConfig::default() })]
#[case::no_point_lights(RendererConfig { max_point_lights: 0, ..RendererConfig::default() })]
#[case::flat_shadow_frustum(RendererConfig { shadow_depth_range: 0.0, ..RendererConfig::default() })]
#[case::degenerate_volume(RendererConfig { light_sphere_segments: 2, ..RendererConfig::default() })]
fn test_invalid_config_rejected(#[case] config: RendererConfig) {
    let mut backend = DummyBackend::new();
    let result = create_pipeline(&mut backend, &config);
    assert!(matches!(result, Err(RenderError::InvalidConfig(_))));
    assert_eq!(backend.live_programs(), 0);
}

#[test]
fn test_pipelines_report_names() {
    let mut backend = DummyBackend::new();
    let names: Vec<String> = [
        PipelineKind::Forward,
        PipelineKind::ForwardLighting,
        PipelineKind::DeferredShading,
        PipelineKind::DeferredLighting,
    ]
    .into_iter()
    .map(|kind| {
        let pipeline = create_pipeline(&mut backend, &config(kind)).unwrap();
        let name = pipeline.name().to_string();
        pipeline.dispose(&mut backend).unwrap();
        name
    })
    .collect();
    assert_eq!(
        names,
        ["Forward", "Forward Lighting", "Deferred Shading", "Deferred Lighting"]
    );
}
