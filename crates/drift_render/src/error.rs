use std::time::Duration;

use drift_core::math::MathError;
use thiserror::Error;

/// Errors surfaced by the renderer and its GPU collaborator.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Device, surface or pipeline setup failed. Fatal at startup.
    #[error("renderer initialization failed: {0}")]
    Initialization(String),

    #[error("failed to allocate {size}-byte buffer '{label}': {reason}")]
    Allocation {
        label: String,
        size: u64,
        reason: String,
    },

    #[error(transparent)]
    Math(#[from] MathError),

    /// No in-flight slot was released within the configured timeout.
    #[error("no frame slot released after {waited:?}")]
    Timeout { waited: Duration },
}
