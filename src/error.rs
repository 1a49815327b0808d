//! Error types for the relay
//!
//! Registry and broadcast paths never fail; errors come from sources,
//! ingress validation and configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Relay error
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying I/O failure (open, read, metadata, write)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Source exceeds the configured maximum size
    #[error("source is {size} bytes, maximum is {max} bytes")]
    SourceTooLarge { size: u64, max: u64 },

    /// Source has no bytes to relay
    #[error("source is empty")]
    EmptySource,

    /// Source path does not exist or is not a regular file
    #[error("source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// The relay was shut down and accepts no new source
    #[error("relay is shut down")]
    RelayClosed,

    /// Configuration value rejected by validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create an invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether the error was caused by the source rather than the relay
    ///
    /// Used by the HTTP layer to pick a client vs server status.
    pub fn is_source_rejection(&self) -> bool {
        matches!(
            self,
            Error::SourceTooLarge { .. } | Error::EmptySource | Error::SourceNotFound(_)
        )
    }
}
