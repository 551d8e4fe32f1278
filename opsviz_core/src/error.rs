//! Error types for the OpsViz engine.
//!
//! The animation math itself cannot fail. Errors only come from
//! configuration that is handed in from outside (scene descriptors,
//! series shapes loaded from JSON).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// A configuration field is out of its valid domain
    #[error("Invalid config field `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// Unknown scene name
    #[error("Unknown scene: {0}")]
    UnknownScene(String),

    /// Unknown telemetry preset
    #[error("Unknown series preset: {0}")]
    UnknownPreset(String),

    /// Scene descriptor could not be parsed
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl CoreError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}
