//! Batch grouping and painter tests.

mod common;

use std::sync::Arc;

use glam::{Mat4, Vec3};
use rstest::rstest;

use common::{camera, material, Fixture};
use lilium_renderer::batch::{self, normal_matrix, BatchMap, GeometryState};
use lilium_renderer::backend::{AttributeType, GraphicsBackend, RenderState};
use lilium_renderer::resources::Polygon;
use lilium_renderer::scene::{Model, Node, Primitive};
use lilium_renderer::shader::{library, uniform, ShaderSource};
use lilium_renderer::{BatchPainter, Material, ShaderBuilder, Subject, Target, TransformState};

#[test]
fn test_one_mesh_one_material() {
    let fixture = Fixture::new();
    let plastic = material("plastic");
    let subjects = [fixture.subject(Vec3::ZERO, &[&plastic])];

    let batches = BatchMap::from_subjects(&subjects, &Mat4::IDENTITY);
    assert_eq!(batches.len(), 1);
    assert_eq!(batches.get(&plastic).map(<[_]>::len), Some(1));
}

#[test]
fn test_shared_material_collapses_into_one_key() {
    let fixture = Fixture::new();
    let plastic = material("plastic");
    let subjects = [
        fixture.subject(Vec3::X, &[&plastic]),
        fixture.subject(-Vec3::X, &[&plastic]),
    ];

    let batches = BatchMap::from_subjects(&subjects, &Mat4::IDENTITY);
    assert_eq!(batches.len(), 1);
    let entries = batches.get(&plastic).unwrap();
    assert_eq!(entries.len(), 2);
    // Per-key order follows traversal order
    assert_eq!(entries[0].world, Mat4::from_translation(Vec3::X));
    assert_eq!(entries[1].world, Mat4::from_translation(-Vec3::X));
}

#[test]
fn test_equal_materials_stay_separate() {
    let fixture = Fixture::new();
    let first = material("plastic");
    let second = Arc::new(Material::clone(&first));
    let subjects = [fixture.subject(Vec3::ZERO, &[&first, &second])];

    let batches = BatchMap::from_subjects(&subjects, &Mat4::IDENTITY);
    assert_eq!(batches.len(), 2);
    assert_ne!(first.id(), second.id());
}

#[rstest]
#[case(1, 1)]
#[case(3, 1)]
#[case(3, 3)]
#[case(8, 5)]
fn test_key_count_equals_distinct_materials(#[case] primitives: usize, #[case] distinct: usize) {
    let fixture = Fixture::new();
    let materials: Vec<Arc<Material>> = (0..distinct).map(|i| material(&format!("m{i}"))).collect();
    let picks: Vec<&Arc<Material>> = (0..primitives).map(|i| &materials[i % distinct]).collect();
    let subjects = [
        fixture.subject(Vec3::ZERO, &picks),
        fixture.subject(Vec3::Y, &picks),
    ];

    let batches = BatchMap::from_subjects(&subjects, &Mat4::IDENTITY);
    assert_eq!(batches.len(), distinct);
    assert_eq!(batches.entry_count(), primitives * 2);
    // Keys appear in first-occurrence order
    let keys: Vec<u64> = batches.iter().map(|(m, _)| m.id()).collect();
    let expected: Vec<u64> = materials.iter().map(|m| m.id()).collect();
    assert_eq!(keys, expected);
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(5)]
fn test_world_matrix_composes_parent_then_local(#[case] depth: usize) {
    let fixture = Fixture::new();
    let plastic = material("plastic");
    let local = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)) * Mat4::from_rotation_y(0.3);

    let mut node = fixture.node(&[&plastic]);
    node.transform = local;
    for _ in 1..depth {
        let mut parent = Node::new(local);
        parent.children.push(node);
        node = parent;
    }
    let root = Mat4::from_scale(Vec3::splat(2.0));
    let subjects = [Subject::new(root, Arc::new(Model::new(vec![node])))];

    let batches = BatchMap::from_subjects(&subjects, &Mat4::IDENTITY);
    let entry = &batches.get(&plastic).unwrap()[0];
    let expected = (0..depth).fold(root, |world, _| world * local);
    assert!(entry.world.abs_diff_eq(expected, 1e-5));
}

#[test]
fn test_grouping_is_idempotent() {
    let fixture = Fixture::new();
    let red = material("red");
    let blue = material("blue");
    let subjects = [
        fixture.subject(Vec3::ZERO, &[&red, &blue, &red]),
        fixture.subject(Vec3::Z, &[&blue]),
    ];
    let view = camera().view;

    let first = BatchMap::from_subjects(&subjects, &view);
    let second = BatchMap::from_subjects(&subjects, &view);
    let describe = |map: &BatchMap| -> Vec<(u64, Vec<Mat4>)> {
        map.iter()
            .map(|(m, entries)| (m.id(), entries.iter().map(|e| e.world).collect()))
            .collect()
    };
    assert_eq!(describe(&first), describe(&second));
}

#[test]
fn test_normal_matrix_uses_view_and_world() {
    let fixture = Fixture::new();
    let plastic = material("plastic");
    let subjects = [fixture.subject(Vec3::new(0.0, 0.0, -2.0), &[&plastic])];
    let view = camera().view;

    let batches = BatchMap::from_subjects(&subjects, &view);
    let entry = &batches.get(&plastic).unwrap()[0];
    let expected = normal_matrix(&view, &entry.world);
    assert!(entry.normal.abs_diff_eq(expected, 1e-6));
    assert_eq!(entry.geometry(), GeometryState::new(&view, entry.world));
}

#[test]
fn test_visit_reaches_every_primitive_without_grouping() {
    let fixture = Fixture::new();
    let red = material("red");
    let node = fixture
        .node(&[&red])
        .with_child(fixture.node(&[&red, &red]).with_child(fixture.node(&[&red])));

    let mut seen = 0;
    batch::visit(&Mat4::IDENTITY, &Mat4::IDENTITY, &node, &mut |_: &Primitive, _: &GeometryState| {
        seen += 1;
        Ok::<(), ()>(())
    })
    .unwrap();
    assert_eq!(seen, node.primitive_count());
}

const FLAT_FRAGMENT: &str = r#"
uniform vec4 albedoFactor;
out vec4 fragColor;
void main() {
    fragColor = albedoFactor;
}
"#;

fn flat_painter(fixture: &mut Fixture) -> BatchPainter<TransformState> {
    let source = ShaderSource::new(library::TRANSFORM_VERTEX, FLAT_FRAGMENT);
    let mut builder = ShaderBuilder::<TransformState>::new(&mut fixture.backend, "flat", &source).unwrap();
    builder
        .scene()
        .set_uniform("projectionMatrix", uniform::mat4(|s: &TransformState| s.projection))
        .unwrap()
        .set_uniform("viewMatrix", uniform::mat4(|s: &TransformState| s.view))
        .unwrap();
    builder
        .material()
        .set_uniform("albedoFactor", uniform::vec4(|m: &Material| m.albedo_factor))
        .unwrap();
    builder
        .geometry()
        .set_uniform("modelMatrix", uniform::mat4(|g: &GeometryState| g.world))
        .unwrap();
    builder
        .polygon()
        .set_attribute(
            "points",
            3,
            AttributeType::Float,
            |p: &Polygon| Some(p.points.handle()),
        )
        .unwrap();
    BatchPainter::new(builder.build())
}

#[test]
fn test_material_bound_once_per_key() {
    let mut fixture = Fixture::new();
    let plastic = material("plastic");
    let subjects = [
        fixture.subject(Vec3::X, &[&plastic]),
        fixture.subject(-Vec3::X, &[&plastic]),
    ];
    let mut painter = flat_painter(&mut fixture);
    let target = Target::default_framebuffer(320, 240);
    let state = camera();

    fixture.backend.set_render_state(&RenderState::opaque());
    painter
        .paint(&mut fixture.backend, &target, &subjects, &state.view, &state)
        .unwrap();

    assert_eq!(fixture.backend.draw_calls(), 2);
    assert_eq!(fixture.backend.uniform_uploads("albedoFactor"), 1);
    assert_eq!(fixture.backend.uniform_uploads("viewMatrix"), 1);
    assert_eq!(fixture.backend.uniform_uploads("modelMatrix"), 2);
    painter.dispose(&mut fixture.backend).unwrap();
}

#[rstest]
#[case(1)]
#[case(4)]
fn test_material_binds_scale_with_distinct_materials(#[case] distinct: usize) {
    let mut fixture = Fixture::new();
    let materials: Vec<Arc<Material>> = (0..distinct).map(|i| material(&format!("m{i}"))).collect();
    let picks: Vec<&Arc<Material>> = (0..12).map(|i| &materials[i % distinct]).collect();
    let subjects = [fixture.subject(Vec3::ZERO, &picks)];
    let mut painter = flat_painter(&mut fixture);
    let state = camera();

    painter
        .paint(
            &mut fixture.backend,
            &Target::default_framebuffer(320, 240),
            &subjects,
            &state.view,
            &state,
        )
        .unwrap();
    assert_eq!(fixture.backend.draw_calls(), 12);
    assert_eq!(fixture.backend.uniform_uploads("albedoFactor"), distinct);
    painter.dispose(&mut fixture.backend).unwrap();
}
