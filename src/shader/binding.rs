//! Binding tiers, declarations and texture-unit allocation

use std::fmt;

use crate::backend::traits::*;
use crate::backend::types::AttributeType;
use crate::error::{BindingError, ShaderError};

use super::uniform::UniformAccessor;

/// Binding scope, ordered by how often its state changes during a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    Scene,
    Material,
    Geometry,
    Polygon,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Scene => write!(f, "scene"),
            Tier::Material => write!(f, "material"),
            Tier::Geometry => write!(f, "geometry"),
            Tier::Polygon => write!(f, "polygon"),
        }
    }
}

/// What a declared name refers to in the program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Attribute,
    Uniform,
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingKind::Attribute => write!(f, "attribute"),
            BindingKind::Uniform => write!(f, "uniform"),
        }
    }
}

pub(crate) type BindFn<T> =
    Box<dyn FnMut(&T, &mut dyn GraphicsBackend) -> Result<(), BindingError>>;

/// A texture unit handed out during declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureUnit {
    pub tier: Tier,
    pub name: String,
    pub unit: u32,
}

/// Hands out texture units in declaration order, across all tiers of one shader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextureUnitAllocator {
    units: Vec<TextureUnit>,
}

impl TextureUnitAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, tier: Tier, name: &str) -> u32 {
        let unit = self.units.len() as u32;
        self.units.push(TextureUnit {
            tier,
            name: name.to_string(),
            unit,
        });
        unit
    }

    pub fn units(&self) -> &[TextureUnit] {
        &self.units
    }

    pub fn unit_of(&self, name: &str) -> Option<u32> {
        self.units.iter().find(|u| u.name == name).map(|u| u.unit)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// The ordered bindings of one tier
pub struct Binder<T> {
    tier: Tier,
    names: Vec<String>,
    bindings: Vec<BindFn<T>>,
}

impl<T> Binder<T> {
    pub(crate) fn new(tier: Tier) -> Self {
        Self {
            tier,
            names: Vec::new(),
            bindings: Vec::new(),
        }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Declared names, in binding order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Replay every binding of the tier against `state`.
    pub fn bind(&mut self, state: &T, backend: &mut dyn GraphicsBackend) -> Result<(), BindingError> {
        for binding in &mut self.bindings {
            binding(state, backend)?;
        }
        Ok(())
    }

    fn check_unique(&self, name: &str) -> Result<(), ShaderError> {
        if self.names.iter().any(|n| n == name) {
            return Err(ShaderError::DuplicateBinding {
                tier: self.tier,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn push(&mut self, name: &str, binding: BindFn<T>) {
        self.names.push(name.to_string());
        self.bindings.push(binding);
    }
}

/// Declaration handle for one tier of a shader under construction
pub struct Declaration<'a, T> {
    pub(crate) backend: &'a mut dyn GraphicsBackend,
    pub(crate) program: ProgramHandle,
    pub(crate) binder: &'a mut Binder<T>,
    pub(crate) units: &'a mut TextureUnitAllocator,
}

impl<T: 'static> Declaration<'_, T> {
    pub fn tier(&self) -> Tier {
        self.binder.tier
    }

    /// Feed the attribute `name` from the vertex stream `getter` returns.
    ///
    /// `size` is the component count per vertex. A getter returning `None` at
    /// bind time fails the bind with [`BindingError::InvalidBinding`].
    pub fn set_attribute<F>(
        &mut self,
        name: &str,
        size: u32,
        ty: AttributeType,
        getter: F,
    ) -> Result<&mut Self, ShaderError>
    where
        F: Fn(&T) -> Option<BufferHandle> + 'static,
    {
        let tier = self.binder.tier;
        self.binder.check_unique(name)?;
        let location = self
            .backend
            .attribute_location(self.program, name)
            .ok_or_else(|| ShaderError::MissingLocation {
                tier,
                kind: BindingKind::Attribute,
                name: name.to_string(),
            })?;

        let owned = name.to_string();
        self.binder.push(
            name,
            Box::new(move |state, backend| {
                let buffer = getter(state).ok_or_else(|| BindingError::InvalidBinding {
                    tier,
                    name: owned.clone(),
                })?;
                backend.set_attribute(location, buffer, size, ty);
                Ok(())
            }),
        );
        Ok(self)
    }

    /// Upload the uniform `name` through `accessor`. Texture accessors take the next texture unit.
    pub fn set_uniform(&mut self, name: &str, accessor: UniformAccessor<T>) -> Result<&mut Self, ShaderError> {
        let tier = self.binder.tier;
        self.binder.check_unique(name)?;
        let location = self
            .backend
            .uniform_location(self.program, name)
            .ok_or_else(|| ShaderError::MissingLocation {
                tier,
                kind: BindingKind::Uniform,
                name: name.to_string(),
            })?;

        let binding = accessor.into_binding(tier, name, location, self.units);
        self.binder.push(name, binding);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_increase_across_tiers() {
        let mut units = TextureUnitAllocator::new();
        assert_eq!(units.allocate(Tier::Scene, "shadowMap"), 0);
        assert_eq!(units.allocate(Tier::Material, "albedoMap"), 1);
        assert_eq!(units.allocate(Tier::Material, "normalMap"), 2);
        assert_eq!(units.unit_of("normalMap"), Some(2));
        assert_eq!(units.units()[1].tier, Tier::Material);
    }

    #[test]
    fn test_tier_order_matches_bind_frequency() {
        assert!(Tier::Scene < Tier::Material);
        assert!(Tier::Material < Tier::Geometry);
        assert!(Tier::Geometry < Tier::Polygon);
    }
}
