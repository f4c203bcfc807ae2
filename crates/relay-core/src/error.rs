//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Display name is empty after trimming
    #[error("Display name must not be empty")]
    EmptyName,

    /// Display name contains a line break and could not be relayed intact
    #[error("Display name contains a line break: {name:?}")]
    NameContainsLineBreak { name: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
