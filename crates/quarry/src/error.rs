//! Error types for quarry

use thiserror::Error;

/// Result type alias for quarry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for this crate.
///
/// Compilation itself never fails; only execution-adjacent steps (result
/// materialization, the preloader's follow-up query, "expect exactly one
/// row") produce errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A single-result fetch matched zero rows. Recoverable.
    #[error("not found: {0}")]
    NotFound(String),

    /// Schema or association declaration mismatch discovered during preload
    /// or changeset derivation. Indicates a programming error; fail fast,
    /// never retry.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Opaque error from the external executor (driver, network, constraint
    /// violation). Wrapped and passed through unchanged.
    #[error("execution error: {0}")]
    Execution(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Wrap an executor error
    pub fn execution(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Execution(Box::new(err))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Check if this is a wrapped executor error
    pub fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }
}
