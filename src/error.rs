//! Renderer error types.
//!
//! Three failure classes exist: configuration errors raised while a shader is
//! loaded ([`ShaderError`]), contract violations raised while a tier is bound
//! ([`BindingError`]) and native failures ([`BackendError`]). [`RenderError`]
//! wraps all of them for `paint`, `process` and `resize`.

use thiserror::Error;

use crate::backend::{BackendError, ShaderStage};
use crate::shader::{BindingKind, Tier};

/// Errors raised while compiling a shader or declaring its bindings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShaderError {
    #[error("{stage} shader compilation failed: {message}\n{window}")]
    Compilation {
        stage: ShaderStage,
        message: String,
        /// Numbered source lines around the offending line
        window: String,
    },
    #[error("program link failed: {0}")]
    Link(String),
    #[error("{tier} binding '{name}' declared twice")]
    DuplicateBinding { tier: Tier, name: String },
    #[error("{tier} {kind} '{name}' has no location in the program")]
    MissingLocation {
        tier: Tier,
        kind: BindingKind,
        name: String,
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors raised while binding tier state before a draw.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("invalid {tier} binding '{name}': no value supplied")]
    InvalidBinding { tier: Tier, name: String },
}

/// Umbrella error returned by painters and pipelines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BindingError::InvalidBinding {
            tier: Tier::Material,
            name: "albedoMap".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid material binding 'albedoMap': no value supplied"
        );

        let err: RenderError = ShaderError::DuplicateBinding {
            tier: Tier::Scene,
            name: "viewMatrix".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "scene binding 'viewMatrix' declared twice");
    }
}
