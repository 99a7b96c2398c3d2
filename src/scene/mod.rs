//! Scene management
//!
//! The per-frame input of a pipeline: subjects to draw, lights and ambient color.

mod camera;
mod light;
mod node;
mod transform;

pub use camera::*;
pub use light::*;
pub use node::*;
pub use transform::*;

use glam::Vec3;

/// Everything a pipeline draws in one frame
#[derive(Debug, Clone)]
pub struct Scene {
    pub subjects: Vec<Subject>,
    pub directional_lights: Vec<DirectionalLight>,
    pub point_lights: Vec<PointLight>,
    pub ambient: Vec3,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            subjects: Vec::new(),
            directional_lights: Vec::new(),
            point_lights: Vec::new(),
            ambient: Vec3::splat(0.1),
        }
    }

    pub fn add_subject(&mut self, subject: Subject) {
        self.subjects.push(subject);
    }

    pub fn add_directional_light(&mut self, light: DirectionalLight) {
        self.directional_lights.push(light);
    }

    pub fn add_point_light(&mut self, light: PointLight) {
        self.point_lights.push(light);
    }

    pub fn with_ambient(mut self, ambient: Vec3) -> Self {
        self.ambient = ambient;
        self
    }

    pub fn light_count(&self) -> usize {
        self.directional_lights.len() + self.point_lights.len()
    }
}
