//! Shared fixtures for the integration tests.
//!
//! Everything runs against `DummyBackend`, which records native calls so
//! binding and draw counts can be asserted without a GPU.

#![allow(dead_code)]

use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};

use lilium_renderer::resources::{IndexBuffer, Polygon, Texture, TextureData};
use lilium_renderer::scene::{Model, Node, Primitive};
use lilium_renderer::{Camera, DummyBackend, Material, MaterialFeatures, MeshData, Subject, TransformState};

/// Install the test logger once per binary.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A dummy backend plus one uploaded cube shared by every primitive
pub struct Fixture {
    pub backend: DummyBackend,
    pub polygon: Arc<Polygon>,
    pub indices: Arc<IndexBuffer>,
}

impl Fixture {
    pub fn new() -> Self {
        init_logging();
        let mut backend = DummyBackend::new();
        let (polygon, indices) = MeshData::cube()
            .upload(&mut backend)
            .expect("cube upload");
        Self {
            backend,
            polygon: Arc::new(polygon),
            indices: Arc::new(indices),
        }
    }

    pub fn primitive(&self, material: &Arc<Material>) -> Primitive {
        Primitive::new(self.indices.clone(), material.clone(), self.polygon.clone())
    }

    /// One node at the origin holding a primitive per material.
    pub fn node(&self, materials: &[&Arc<Material>]) -> Node {
        materials
            .iter()
            .fold(Node::default(), |node, material| node.with_primitive(self.primitive(material)))
    }

    /// A subject at `position` whose model is a single node with one primitive per material.
    pub fn subject(&self, position: Vec3, materials: &[&Arc<Material>]) -> Subject {
        Subject::new(
            Mat4::from_translation(position),
            Arc::new(Model::new(vec![self.node(materials)])),
        )
    }

    /// A material sampling a checkerboard albedo map.
    pub fn textured_material(&mut self, name: &str) -> Arc<Material> {
        self.material_with_maps(name, MaterialFeatures::default().with_albedo_map())
    }

    /// A material with a checkerboard texture in every map `maps` enables.
    pub fn material_with_maps(&mut self, name: &str, maps: MaterialFeatures) -> Arc<Material> {
        let data = TextureData::checkerboard(16, [255, 255, 255, 255], [40, 40, 40, 255]);
        let texture = Arc::new(Texture::from_data(&mut self.backend, &data).expect("texture upload"));
        let mut material = Material::new(name);
        if maps.albedo_map {
            material = material.with_albedo_map(texture.clone());
        }
        if maps.normal_map {
            material = material.with_normal_map(texture.clone());
        }
        if maps.emissive_map {
            material = material.with_emissive_map(texture.clone());
        }
        if maps.gloss_map {
            material = material.with_gloss_map(texture);
        }
        Arc::new(material)
    }
}

pub fn material(name: &str) -> Arc<Material> {
    Arc::new(
        Material::new(name)
            .with_albedo(Vec4::new(0.8, 0.2, 0.2, 1.0))
            .with_specular(0.5, 32.0),
    )
}

/// Camera five units back on +Z looking at the origin.
pub fn camera() -> TransformState {
    let mut camera = Camera::new(Vec3::new(0.0, 1.0, 5.0), Vec3::ZERO);
    camera.set_aspect(320.0, 240.0);
    camera.transform_state()
}
