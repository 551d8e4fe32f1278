//! Error types for the OpsViz environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// No async runtime is available to drive frames or timers
    #[error("Runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// The requested frame rate cannot be driven
    #[error("Invalid frame rate: {0} Hz")]
    InvalidFrameRate(u32),

    /// Context operation failed
    #[error("Context error: {0}")]
    ContextError(String),

    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a context error.
    pub fn context(msg: impl Into<String>) -> Self {
        Self::ContextError(msg.into())
    }
}
