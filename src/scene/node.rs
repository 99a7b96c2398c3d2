//! Scene graph nodes

use std::sync::Arc;

use glam::Mat4;

use crate::resources::{IndexBuffer, Material, Polygon};

/// A drawable piece of a mesh: one index buffer, one material, one set of vertex streams.
#[derive(Debug, Clone)]
pub struct Primitive {
    pub index_buffer: Arc<IndexBuffer>,
    pub material: Arc<Material>,
    pub polygon: Arc<Polygon>,
}

impl Primitive {
    pub fn new(index_buffer: Arc<IndexBuffer>, material: Arc<Material>, polygon: Arc<Polygon>) -> Self {
        Self {
            index_buffer,
            material,
            polygon,
        }
    }
}

/// Local transform, child nodes and primitives
#[derive(Debug, Clone)]
pub struct Node {
    pub transform: Mat4,
    pub children: Vec<Node>,
    pub primitives: Vec<Primitive>,
}

impl Default for Node {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY)
    }
}

impl Node {
    pub fn new(transform: Mat4) -> Self {
        Self {
            transform,
            children: Vec::new(),
            primitives: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_primitive(mut self, primitive: Primitive) -> Self {
        self.primitives.push(primitive);
        self
    }

    /// Primitives in this node and all descendants.
    pub fn primitive_count(&self) -> usize {
        self.primitives.len()
            + self
                .children
                .iter()
                .map(Node::primitive_count)
                .sum::<usize>()
    }
}

/// A set of root nodes, shared between subjects
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub meshes: Vec<Node>,
}

impl Model {
    pub fn new(meshes: Vec<Node>) -> Self {
        Self { meshes }
    }

    /// Model made of a single primitive at the origin.
    pub fn single(primitive: Primitive) -> Self {
        Self::new(vec![Node::default().with_primitive(primitive)])
    }

    pub fn primitive_count(&self) -> usize {
        self.meshes.iter().map(Node::primitive_count).sum()
    }
}

/// A placed instance of a model
#[derive(Debug, Clone)]
pub struct Subject {
    pub transform: Mat4,
    pub model: Arc<Model>,
}

impl Subject {
    pub fn new(transform: Mat4, model: Arc<Model>) -> Self {
        Self { transform, model }
    }
}
