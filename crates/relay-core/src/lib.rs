//! Relay Core - Shared types for the text relay
//!
//! This crate provides the identity types shared between
//! the wire protocol (relay-protocol) and the daemon (relayd).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod session;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use session::{DisplayName, SessionId};
