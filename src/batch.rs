//! Material batching
//!
//! Walks subject node trees depth-first, composing world transforms on the
//! way down, and files every primitive under its material. Materials are
//! keyed by `Arc` identity, so two structurally equal materials loaded twice
//! stay separate batches while every primitive sharing one `Arc` lands in the
//! same list.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use glam::{Mat3, Mat4};
use indexmap::IndexMap;

use crate::resources::{IndexBuffer, Material, Polygon};
use crate::scene::{Node, Primitive, Subject};

/// Geometry-tier state of one draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryState {
    pub world: Mat4,
    pub normal: Mat3,
}

impl Default for GeometryState {
    fn default() -> Self {
        Self {
            world: Mat4::IDENTITY,
            normal: Mat3::IDENTITY,
        }
    }
}

impl GeometryState {
    pub fn new(view: &Mat4, world: Mat4) -> Self {
        Self {
            world,
            normal: normal_matrix(view, &world),
        }
    }
}

/// Inverse-transpose of the upper 3x3 of `view * world`.
pub fn normal_matrix(view: &Mat4, world: &Mat4) -> Mat3 {
    Mat3::from_mat4(*view * *world).inverse().transpose()
}

/// One primitive instance ready to draw
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub index_buffer: Arc<IndexBuffer>,
    pub world: Mat4,
    pub normal: Mat3,
    pub polygon: Arc<Polygon>,
}

impl BatchEntry {
    pub fn geometry(&self) -> GeometryState {
        GeometryState {
            world: self.world,
            normal: self.normal,
        }
    }
}

/// Batch key comparing materials by pointer
#[derive(Debug, Clone)]
pub struct MaterialKey(pub Arc<Material>);

impl PartialEq for MaterialKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for MaterialKey {}

impl Hash for MaterialKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

/// Draw lists per material, in first-occurrence order
#[derive(Debug, Default)]
pub struct BatchMap {
    batches: IndexMap<MaterialKey, Vec<BatchEntry>>,
}

impl BatchMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group every primitive reachable from `subjects`.
    pub fn from_subjects(subjects: &[Subject], view: &Mat4) -> Self {
        let mut map = Self::new();
        for subject in subjects {
            for node in &subject.model.meshes {
                group(&mut map, view, &subject.transform, node);
            }
        }
        map
    }

    /// Number of distinct materials.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Total number of draws across all materials.
    pub fn entry_count(&self) -> usize {
        self.batches.values().map(Vec::len).sum()
    }

    pub fn get(&self, material: &Arc<Material>) -> Option<&[BatchEntry]> {
        self.batches
            .get(&MaterialKey(material.clone()))
            .map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<Material>, &[BatchEntry])> {
        self.batches
            .iter()
            .map(|(key, entries)| (&key.0, entries.as_slice()))
    }

    pub fn push(&mut self, material: &Arc<Material>, entry: BatchEntry) {
        self.batches
            .entry(MaterialKey(material.clone()))
            .or_default()
            .push(entry);
    }
}

/// Append `node` and its descendants to `map`, `parent` being the world matrix above `node`.
pub fn group(map: &mut BatchMap, view: &Mat4, parent: &Mat4, node: &Node) {
    let world = *parent * node.transform;
    let normal = normal_matrix(view, &world);
    for primitive in &node.primitives {
        map.push(
            &primitive.material,
            BatchEntry {
                index_buffer: primitive.index_buffer.clone(),
                world,
                normal,
                polygon: primitive.polygon.clone(),
            },
        );
    }
    for child in &node.children {
        group(map, view, &world, child);
    }
}

/// Depth-first walk without grouping, calling `f` with each primitive and its geometry state.
pub fn visit<E>(
    view: &Mat4,
    parent: &Mat4,
    node: &Node,
    f: &mut dyn FnMut(&Primitive, &GeometryState) -> Result<(), E>,
) -> Result<(), E> {
    let state = GeometryState::new(view, *parent * node.transform);
    for primitive in &node.primitives {
        f(primitive, &state)?;
    }
    for child in &node.children {
        visit(view, &state.world, child, f)?;
    }
    Ok(())
}
