//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending commands
//! to the registry actor and subscribing to registry events.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `RegistryError::ChannelClosed` or to the
//!   operation's "nothing happened" value

use tokio::sync::{broadcast, mpsc, oneshot};

use relay_core::{DisplayName, SessionId};
use relay_protocol::Notification;

use super::commands::{Outbox, RegistryCommand, RegistryError, RegistryEvent, RemovalReason};

// ============================================================================
// Registry Handle
// ============================================================================

/// Handle for interacting with the registry actor.
///
/// This is a cheap-to-clone handle that can be shared across tasks.
/// All methods are async and communicate with the actor via channels.
///
/// # Usage
///
/// ```ignore
/// let handle = registry_handle.clone();
///
/// // Claim a name for a connection
/// let name = handle.try_register(session_id, "alice".into(), outbox).await?;
///
/// // List everyone
/// let names = handle.snapshot().await;
/// ```
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,

    /// Event broadcaster for subscribing to updates
    event_sender: broadcast::Sender<RegistryEvent>,
}

impl RegistryHandle {
    /// Create a new registry handle.
    ///
    /// # Arguments
    ///
    /// * `sender` - The command channel sender for communicating with the actor
    /// * `event_sender` - The broadcast sender for subscribing to events
    pub fn new(
        sender: mpsc::Sender<RegistryCommand>,
        event_sender: broadcast::Sender<RegistryEvent>,
    ) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Claim `name` for `session_id` and make the session live.
    ///
    /// On success every live session (including this one) is told about the
    /// join, and `outbox` additionally receives the current user list.
    ///
    /// # Errors
    ///
    /// - `RegistryError::InvalidName` if the name is empty after trimming
    /// - `RegistryError::NameTaken` if another live session holds the name
    /// - `RegistryError::AlreadyJoined` if this session already holds a name
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn try_register(
        &self,
        session_id: SessionId,
        name: String,
        outbox: Outbox,
    ) -> Result<DisplayName, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Register {
                session_id,
                name,
                outbox,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Relay chat text from a live session.
    ///
    /// # Errors
    ///
    /// - `RegistryError::NotJoined` if the session has no name yet
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn chat(&self, session_id: SessionId, text: String) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Chat {
                session_id,
                text,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Deliver a notification to every live session.
    ///
    /// Returns how many sessions it was queued for, or 0 if communication
    /// with the actor fails.
    pub async fn broadcast(&self, notification: Notification) -> usize {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Broadcast {
                notification,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return 0;
        }

        rx.await.unwrap_or_default()
    }

    /// Remove a session from the live set, freeing its name.
    ///
    /// Idempotent: returns `false` if the session was not live (never joined,
    /// already removed, or the actor is gone).
    pub async fn remove(&self, session_id: SessionId, reason: RemovalReason) -> bool {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Remove {
                session_id,
                reason,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return false;
        }

        rx.await.unwrap_or(false)
    }

    /// Kick the session holding `target`, without an issuing session.
    ///
    /// Returns `false` if no live session holds that name.
    pub async fn kick(&self, target: impl Into<String>) -> bool {
        self.send_kick(None, target.into()).await.unwrap_or(false)
    }

    /// Kick the session holding `target` on behalf of `issuer`.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotJoined` if `issuer` is not live when the
    /// registry processes the kick, or `RegistryError::ChannelClosed` if
    /// communication with the actor fails.
    pub async fn kick_as(
        &self,
        issuer: SessionId,
        target: impl Into<String>,
    ) -> Result<bool, RegistryError> {
        self.send_kick(Some(issuer), target.into()).await
    }

    async fn send_kick(
        &self,
        issuer: Option<SessionId>,
        target: String,
    ) -> Result<bool, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Kick {
                issuer,
                target,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Get the claimed names at one point in time, sorted.
    ///
    /// Returns an empty vector if communication with the actor fails.
    pub async fn snapshot(&self) -> Vec<DisplayName> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Snapshot { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Subscribe to registry events.
    ///
    /// Only events published after this call are received.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.event_sender.subscribe()
    }

    /// Check if the actor is still running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
