//! Error types for the simulation harness.

use opsviz_core::CoreError;
use opsviz_env::EnvError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// Host setup failed
    #[error("Host error: {0}")]
    Env(#[from] EnvError),

    /// Scene or series configuration rejected by the engine
    #[error("Engine error: {0}")]
    Core(#[from] CoreError),

    /// Harness configuration is out of range
    #[error("Invalid simulation config: {0}")]
    InvalidConfig(String),

    /// Export could not be written
    #[error("Export I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Export could not be serialized
    #[error("Export encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
