//! Light types for the scene

use glam::{Mat4, Vec3};

/// Directional light (like the sun)
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels in, world space
    pub direction: Vec3,
    pub color: Vec3,
    pub casts_shadow: bool,
}

/// Used wherever a directional light has no usable direction
fn fallback_direction() -> Vec3 {
    Vec3::new(-0.5, -1.0, -0.5).normalize()
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: fallback_direction(),
            color: Vec3::ONE,
            casts_shadow: false,
        }
    }
}

impl DirectionalLight {
    /// A zero or non-finite `direction` falls back to the default light direction.
    pub fn new(direction: Vec3, color: Vec3) -> Self {
        let direction = direction.try_normalize().unwrap_or_else(|| {
            log::warn!("Directional light with degenerate direction {}, using default", direction);
            fallback_direction()
        });
        Self {
            direction,
            color,
            casts_shadow: false,
        }
    }

    /// Normalized travel direction, tolerating a degenerate `direction` field.
    pub fn unit_direction(&self) -> Vec3 {
        self.direction.try_normalize().unwrap_or_else(fallback_direction)
    }

    pub fn with_shadow(mut self, casts_shadow: bool) -> Self {
        self.casts_shadow = casts_shadow;
        self
    }

    /// Direction towards the light in view space.
    pub fn view_direction(&self, view: &Mat4) -> Vec3 {
        view.transform_vector3(-self.unit_direction()).normalize_or_zero()
    }

    /// Light-space view matrix looking along the light direction through the origin.
    pub fn shadow_view(&self) -> Mat4 {
        let direction = self.unit_direction();
        let up = if direction.y.abs() > 0.99 { Vec3::Z } else { Vec3::Y };
        Mat4::look_to_rh(Vec3::ZERO, direction, up)
    }

    /// Orthographic light projection covering a `2 * extent` wide box, `2 * depth_range` deep.
    pub fn shadow_projection(extent: f32, depth_range: f32) -> Mat4 {
        Mat4::orthographic_rh_gl(-extent, extent, -extent, extent, -depth_range, depth_range)
    }
}

/// Point light with a finite radius of influence
#[derive(Debug, Clone, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub radius: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            color: Vec3::ONE,
            radius: 10.0,
        }
    }
}

impl PointLight {
    pub fn new(position: Vec3, color: Vec3, radius: f32) -> Self {
        Self {
            position,
            color,
            radius,
        }
    }

    pub fn view_position(&self, view: &Mat4) -> Vec3 {
        view.transform_point3(self.position)
    }

    /// World transform of the unit light volume.
    pub fn volume_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position) * Mat4::from_scale(Vec3::splat(self.radius))
    }
}
