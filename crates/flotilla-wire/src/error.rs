//! Wire-level error types.

use thiserror::Error;

/// Errors produced while encoding or decoding wire payloads.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("payload yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
