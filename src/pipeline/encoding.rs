//! CPU mirrors of the packing functions in [`crate::shader::library`]
//!
//! Used to check the packing math and to precompute clear values.

use glam::{Vec2, Vec3};

/// Largest light contribution stored in the accumulation buffer, as `exp2(-x)`.
pub const MAX_LIGHT_CONTRIBUTION: f32 = 16.0;

/// Smallest accumulated sample decoded, bounding the total light at 24.
pub const MIN_LIGHT_SAMPLE: f32 = 5.960_464_5e-8;

/// Spheremap packing of a unit normal into `[0, 1]^2`.
pub fn encode_normal(n: Vec3) -> Vec2 {
    let p = (n.z * 8.0 + 8.0).sqrt();
    if p < 1e-6 {
        return Vec2::new(1.0, 0.5);
    }
    Vec2::new(n.x, n.y) / p + Vec2::splat(0.5)
}

pub fn decode_normal(enc: Vec2) -> Vec3 {
    let fenc = enc * 4.0 - Vec2::splat(2.0);
    let f = fenc.dot(fenc);
    let g = (1.0 - f / 4.0).max(0.0).sqrt();
    (fenc * g).extend(1.0 - f / 2.0)
}

pub fn encode_shininess(shininess: f32) -> f32 {
    1.0 / shininess
}

pub fn decode_shininess(encoded: f32) -> f32 {
    1.0 / encoded
}

/// One light's contribution as written to the accumulation buffer.
pub fn encode_light(contribution: f32) -> f32 {
    (-contribution.clamp(0.0, MAX_LIGHT_CONTRIBUTION)).exp2()
}

/// Total light from the product of every encoded contribution.
pub fn decode_light(sample: f32) -> f32 {
    -sample.max(MIN_LIGHT_SAMPLE).log2()
}
