//! Uniform accessors
//!
//! An accessor says how many floats of scratch space a uniform needs, whether
//! it consumes a texture unit and how to marshal a value out of tier state.
//! The scratch buffer is allocated once, when the binding is declared, and
//! reused by every bind.

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

use crate::backend::traits::{TextureHandle, UniformLocation};
use crate::backend::types::UniformValue;
use crate::error::BindingError;

use super::binding::{BindFn, TextureUnitAllocator, Tier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FloatShape {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
}

impl FloatShape {
    fn value(self, data: &[f32]) -> UniformValue<'_> {
        match self {
            FloatShape::Float => UniformValue::Float(data),
            FloatShape::Vec2 => UniformValue::Vec2(data),
            FloatShape::Vec3 => UniformValue::Vec3(data),
            FloatShape::Vec4 => UniformValue::Vec4(data),
            FloatShape::Mat3 => UniformValue::Mat3(data),
            FloatShape::Mat4 => UniformValue::Mat4(data),
        }
    }
}

enum Marshal<T> {
    Floats(FloatShape, Box<dyn Fn(&T, &mut [f32])>),
    Int(Box<dyn Fn(&T) -> i32>),
    Texture(Box<dyn Fn(&T) -> Option<TextureHandle>>),
}

/// Describes how one uniform is read from tier state `T`
pub struct UniformAccessor<T> {
    scratch_size: usize,
    marshal: Marshal<T>,
}

impl<T: 'static> UniformAccessor<T> {
    fn floats(shape: FloatShape, scratch_size: usize, fill: impl Fn(&T, &mut [f32]) + 'static) -> Self {
        Self {
            scratch_size,
            marshal: Marshal::Floats(shape, Box::new(fill)),
        }
    }

    /// Scalars uploaded per bind.
    pub fn scratch_size(&self) -> usize {
        self.scratch_size
    }

    pub fn uses_texture_unit(&self) -> bool {
        matches!(self.marshal, Marshal::Texture(_))
    }

    pub(crate) fn into_binding(
        self,
        tier: Tier,
        name: &str,
        location: UniformLocation,
        units: &mut TextureUnitAllocator,
    ) -> BindFn<T> {
        match self.marshal {
            Marshal::Floats(shape, fill) => {
                let mut scratch = vec![0.0f32; self.scratch_size];
                Box::new(move |state, backend| {
                    fill(state, &mut scratch);
                    backend.set_uniform(location, shape.value(&scratch));
                    Ok(())
                })
            }
            Marshal::Int(get) => {
                let mut scratch = [0i32; 1];
                Box::new(move |state, backend| {
                    scratch[0] = get(state);
                    backend.set_uniform(location, UniformValue::Int(&scratch));
                    Ok(())
                })
            }
            Marshal::Texture(get) => {
                let unit = units.allocate(tier, name);
                let sampler = [unit as i32];
                let name = name.to_string();
                Box::new(move |state, backend| {
                    let texture = get(state).ok_or_else(|| BindingError::InvalidBinding {
                        tier,
                        name: name.clone(),
                    })?;
                    backend.bind_texture(unit, texture);
                    backend.set_uniform(location, UniformValue::Int(&sampler));
                    Ok(())
                })
            }
        }
    }
}

pub fn float<T: 'static>(get: impl Fn(&T) -> f32 + 'static) -> UniformAccessor<T> {
    UniformAccessor::floats(FloatShape::Float, 1, move |state, out| out[0] = get(state))
}

pub fn int<T: 'static>(get: impl Fn(&T) -> i32 + 'static) -> UniformAccessor<T> {
    UniformAccessor {
        scratch_size: 1,
        marshal: Marshal::Int(Box::new(get)),
    }
}

/// Booleans upload as `0` / `1` integers.
pub fn boolean<T: 'static>(get: impl Fn(&T) -> bool + 'static) -> UniformAccessor<T> {
    int(move |state| i32::from(get(state)))
}

pub fn vec2<T: 'static>(get: impl Fn(&T) -> Vec2 + 'static) -> UniformAccessor<T> {
    UniformAccessor::floats(FloatShape::Vec2, 2, move |state, out| {
        out.copy_from_slice(&get(state).to_array())
    })
}

pub fn vec3<T: 'static>(get: impl Fn(&T) -> Vec3 + 'static) -> UniformAccessor<T> {
    UniformAccessor::floats(FloatShape::Vec3, 3, move |state, out| {
        out.copy_from_slice(&get(state).to_array())
    })
}

pub fn vec4<T: 'static>(get: impl Fn(&T) -> Vec4 + 'static) -> UniformAccessor<T> {
    UniformAccessor::floats(FloatShape::Vec4, 4, move |state, out| {
        out.copy_from_slice(&get(state).to_array())
    })
}

pub fn mat3<T: 'static>(get: impl Fn(&T) -> Mat3 + 'static) -> UniformAccessor<T> {
    UniformAccessor::floats(FloatShape::Mat3, 9, move |state, out| {
        out.copy_from_slice(&get(state).to_cols_array())
    })
}

pub fn mat4<T: 'static>(get: impl Fn(&T) -> Mat4 + 'static) -> UniformAccessor<T> {
    UniformAccessor::floats(FloatShape::Mat4, 16, move |state, out| {
        out.copy_from_slice(&get(state).to_cols_array())
    })
}

/// A `float[len]` uniform. Missing trailing elements upload as zero, extra ones are dropped.
pub fn float_array<T: 'static, F>(len: usize, get: F) -> UniformAccessor<T>
where
    F: Fn(&T) -> &[f32] + 'static,
{
    UniformAccessor::floats(FloatShape::Float, len, move |state, out| {
        out.fill(0.0);
        for (slot, value) in out.iter_mut().zip(get(state)) {
            *slot = *value;
        }
    })
}

/// A `vec3[len]` uniform, padded and truncated like [`float_array`].
pub fn vec3_array<T: 'static, F>(len: usize, get: F) -> UniformAccessor<T>
where
    F: Fn(&T) -> &[Vec3] + 'static,
{
    UniformAccessor::floats(FloatShape::Vec3, len * 3, move |state, out| {
        out.fill(0.0);
        for (slot, value) in out.chunks_exact_mut(3).zip(get(state)) {
            slot.copy_from_slice(&value.to_array());
        }
    })
}

/// A `mat4[len]` uniform, padded and truncated like [`float_array`].
pub fn mat4_array<T: 'static, F>(len: usize, get: F) -> UniformAccessor<T>
where
    F: Fn(&T) -> &[Mat4] + 'static,
{
    UniformAccessor::floats(FloatShape::Mat4, len * 16, move |state, out| {
        out.fill(0.0);
        for (slot, value) in out.chunks_exact_mut(16).zip(get(state)) {
            slot.copy_from_slice(&value.to_cols_array());
        }
    })
}

/// A sampler uniform. Takes a texture unit at declaration; `None` at bind time is an invalid binding.
pub fn texture<T: 'static>(get: impl Fn(&T) -> Option<TextureHandle> + 'static) -> UniformAccessor<T> {
    UniformAccessor {
        scratch_size: 1,
        marshal: Marshal::Texture(Box::new(get)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DummyBackend, GraphicsBackend, RecordedUniform};

    struct Lights {
        colors: Vec<Vec3>,
    }

    fn bind_once<T: 'static>(accessor: UniformAccessor<T>, state: &T) -> (DummyBackend, Result<(), BindingError>) {
        let mut backend = DummyBackend::new();
        let program = backend
            .create_program("void main() {}", "uniform vec3 value[4];\nvoid main() {}")
            .unwrap();
        let location = backend.uniform_location(program, "value").unwrap();
        let mut units = TextureUnitAllocator::new();
        let mut binding = accessor.into_binding(Tier::Scene, "value", location, &mut units);
        let result = binding(state, &mut backend);
        (backend, result)
    }

    #[test]
    fn test_scratch_sizes() {
        assert_eq!(mat3::<()>(|_| Mat3::IDENTITY).scratch_size(), 9);
        assert_eq!(vec3_array::<Lights, _>(4, |l| l.colors.as_slice()).scratch_size(), 12);
        assert!(texture::<()>(|_| None).uses_texture_unit());
        assert!(!float::<()>(|_| 1.0).uses_texture_unit());
    }

    #[test]
    fn test_array_is_zero_padded() {
        let lights = Lights {
            colors: vec![Vec3::new(1.0, 2.0, 3.0)],
        };
        let (backend, result) = bind_once(vec3_array(2, |l: &Lights| l.colors.as_slice()), &lights);
        assert!(result.is_ok());
        assert_eq!(
            backend.last_uniform("value"),
            Some(&RecordedUniform::Floats(vec![1.0, 2.0, 3.0, 0.0, 0.0, 0.0]))
        );
    }

    #[test]
    fn test_missing_texture_names_binding() {
        let (_, result) = bind_once(texture(|_: &()| None), &());
        assert_eq!(
            result,
            Err(BindingError::InvalidBinding {
                tier: Tier::Scene,
                name: "value".to_string()
            })
        );
    }
}
