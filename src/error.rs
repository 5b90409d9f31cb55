//! Top-level error type for building an arbiter from settings and hardware.

use crate::config::ConfigError;
use crate::controller::device_reader::ReaderError;

/// Errors that can occur while setting up the arbiter.
///
/// Nothing in the running loop produces these; once constructed, the arbiter
/// only reports problems through logs and the connection signal.
#[derive(Debug, thiserror::Error)]
pub enum ArbiterError {
    /// Input backend could not be opened
    #[error("Reader error: {0}")]
    ReaderError(#[from] ReaderError),

    /// Settings could not be loaded or failed validation
    #[error("Config error: {0}")]
    ConfigError(#[from] ConfigError),
}
