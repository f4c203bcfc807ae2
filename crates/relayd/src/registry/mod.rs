//! Name registry using Actor pattern.
//!
//! The registry is the single owner of the live-session set and the
//! claimed-name set. It receives commands via a tokio mpsc channel, so every
//! join, chat, broadcast, removal and kick is applied one at a time in the
//! order the actor receives them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │ConnectionHandler│────▶│  RegistryActor  │────▶│ session Outboxes │
//! │ OperatorConsole │     │                 │     │ (one per member) │
//! └─────────────────┘     └────────┬────────┘     └──────────────────┘
//!         │                        │
//!         │   RegistryCommand      │   RegistryEvent (broadcast)
//!         │   (mpsc channel)       ▼
//!         ▼                 ┌─────────────────┐
//!   Register/Chat/Kick      │   Transcript    │
//!                           └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::{broadcast, mpsc};

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{
    Outbound, Outbox, RegistryCommand, RegistryError, RegistryEvent, RemovalReason,
};
pub use handle::RegistryHandle;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 100;
const EVENT_BUFFER: usize = 256;

/// Spawn the registry actor and return a handle for interaction.
///
/// This function:
/// 1. Creates command and event channels
/// 2. Spawns the RegistryActor on a tokio task
/// 3. Returns a RegistryHandle for client use
///
/// The actor stops once every handle has been dropped.
///
/// # Example
///
/// ```no_run
/// use relayd::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_registry();
///
///     let names = handle.snapshot().await;
///     assert!(names.is_empty());
/// }
/// ```
pub fn spawn_registry() -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = RegistryActor::new(cmd_rx, event_tx.clone());
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx, event_tx)
}
