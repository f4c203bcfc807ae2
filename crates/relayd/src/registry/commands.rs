//! Registry actor commands, errors, and events.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `RegistryEvent`: Events published by the registry for observers
//! - `Outbound` / `Outbox`: what the registry pushes into a session's writer

use relay_core::{DisplayName, DomainError, SessionId};
use relay_protocol::Notification;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

// ============================================================================
// Session Outbox
// ============================================================================

/// Items queued for a session's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// One rendered line, without the trailing `\n`.
    Line(String),

    /// Flush everything queued so far, then close the connection.
    Close,
}

/// Sending side of a session's outbound queue.
///
/// Unbounded so the registry never waits on a slow client; the transport is
/// the only backpressure.
pub type Outbox = mpsc::UnboundedSender<Outbound>;

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command that produces a result carries a oneshot channel for the
/// response. The actor handles one command at a time, so every command is a
/// single critical section over the live-session and claimed-name sets.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Claim a display name and add the session to the live set.
    ///
    /// # Errors
    /// - `RegistryError::InvalidName` if the name is empty after trimming
    /// - `RegistryError::NameTaken` if another live session holds the name
    /// - `RegistryError::AlreadyJoined` if this session already holds a name
    Register {
        /// Connection claiming the name
        session_id: SessionId,
        /// Raw JOIN payload
        name: String,
        /// Where this session's notifications go
        outbox: Outbox,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<DisplayName, RegistryError>>,
    },

    /// Relay chat text from a live session to every live session.
    ///
    /// # Errors
    /// - `RegistryError::NotJoined` if the session holds no name
    Chat {
        /// Sending connection
        session_id: SessionId,
        /// MESSAGE payload as received
        text: String,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Deliver a notification to every live session.
    ///
    /// Responds with the number of sessions it was queued for.
    Broadcast {
        /// What to send
        notification: Notification,
        /// Channel to send the delivery count
        respond_to: oneshot::Sender<usize>,
    },

    /// Remove a session and free its name. Removing an unknown session is a
    /// no-op; the response says whether anything was removed.
    Remove {
        /// Connection to remove
        session_id: SessionId,
        /// Why it is leaving
        reason: RemovalReason,
        /// Channel to send whether the session was live
        respond_to: oneshot::Sender<bool>,
    },

    /// Disconnect the session holding `target`. Unknown targets are a no-op;
    /// the response says whether a session was kicked.
    ///
    /// With an `issuer`, the kick is refused unless that session is live.
    Kick {
        /// Session asking for the kick, `None` for the operator
        issuer: Option<SessionId>,
        /// Display name to kick (raw, trimmed by the actor)
        target: String,
        /// Channel to send whether a session was kicked
        respond_to: oneshot::Sender<Result<bool, RegistryError>>,
    },

    /// Get the claimed names in lexicographic order.
    Snapshot {
        /// Channel to send the names
        respond_to: oneshot::Sender<Vec<DisplayName>>,
    },
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// The requested name is not a valid display name.
    #[error("invalid display name: {0}")]
    InvalidName(#[from] DomainError),

    /// Another live session already holds this name.
    #[error("display name already taken: {0}")]
    NameTaken(DisplayName),

    /// The session already joined under a name.
    #[error("{session_id} already joined as {name}")]
    AlreadyJoined {
        /// Session that tried to join twice
        session_id: SessionId,
        /// Name it holds
        name: DisplayName,
    },

    /// The session has not joined yet.
    #[error("{0} has not joined")]
    NotJoined(SessionId),

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

impl RegistryError {
    /// Whether this is a JOIN rejection the client should hear about.
    pub fn is_join_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidName(_) | Self::NameTaken(_) | Self::AlreadyJoined { .. }
        )
    }
}

// ============================================================================
// Registry Events
// ============================================================================

/// Events published by the registry to observers such as the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A session claimed a name and went live.
    Joined {
        /// ID of the session
        session_id: SessionId,
        /// Name it claimed
        name: DisplayName,
    },

    /// A live session was removed and its name freed.
    Removed {
        /// ID of the removed session
        session_id: SessionId,
        /// Name that was freed
        name: DisplayName,
        /// Why the session was removed
        reason: RemovalReason,
    },

    /// A chat line or operator message was fanned out.
    Relayed {
        /// The notification every live session received
        notification: Notification,
        /// Number of sessions it was queued for
        recipients: usize,
    },
}

impl RegistryEvent {
    /// The line broadcast to clients for this event.
    pub fn notification(&self) -> Notification {
        match self {
            Self::Joined { name, .. } => Notification::Joined(name.clone()),
            Self::Removed {
                name,
                reason: RemovalReason::Kicked,
                ..
            } => Notification::WasKicked(name.clone()),
            Self::Removed { name, .. } => Notification::Left(name.clone()),
            Self::Relayed { notification, .. } => notification.clone(),
        }
    }
}

/// Reason why a session was removed from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Client sent QUIT.
    Quit,

    /// Connection hit end of stream or an I/O error.
    Disconnected,

    /// Another client kicked it.
    Kicked,
}

impl std::fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quit => write!(f, "quit"),
            Self::Disconnected => write!(f, "connection closed"),
            Self::Kicked => write!(f, "kicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> DisplayName {
        DisplayName::parse(s).unwrap()
    }

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::NameTaken(name("alice"));
        assert_eq!(err.to_string(), "display name already taken: alice");

        let err = RegistryError::AlreadyJoined {
            session_id: SessionId::new(3),
            name: name("bob"),
        };
        assert_eq!(err.to_string(), "session-3 already joined as bob");

        let err = RegistryError::NotJoined(SessionId::new(9));
        assert_eq!(err.to_string(), "session-9 has not joined");

        let err = RegistryError::ChannelClosed;
        assert_eq!(err.to_string(), "response channel closed");

        let err = RegistryError::from(DomainError::EmptyName);
        assert!(err.to_string().starts_with("invalid display name"));
    }

    #[test]
    fn test_join_rejections() {
        assert!(RegistryError::from(DomainError::EmptyName).is_join_rejection());
        assert!(RegistryError::NameTaken(name("a")).is_join_rejection());
        assert!(!RegistryError::NotJoined(SessionId::new(1)).is_join_rejection());
        assert!(!RegistryError::ChannelClosed.is_join_rejection());
    }

    #[test]
    fn test_removal_reason_display() {
        assert_eq!(RemovalReason::Quit.to_string(), "quit");
        assert_eq!(RemovalReason::Disconnected.to_string(), "connection closed");
        assert_eq!(RemovalReason::Kicked.to_string(), "kicked");
    }

    #[test]
    fn test_event_notifications() {
        let joined = RegistryEvent::Joined {
            session_id: SessionId::new(1),
            name: name("alice"),
        };
        assert_eq!(joined.notification(), Notification::Joined(name("alice")));

        let quit = RegistryEvent::Removed {
            session_id: SessionId::new(1),
            name: name("alice"),
            reason: RemovalReason::Quit,
        };
        assert_eq!(quit.notification(), Notification::Left(name("alice")));

        let kicked = RegistryEvent::Removed {
            session_id: SessionId::new(2),
            name: name("bob"),
            reason: RemovalReason::Kicked,
        };
        assert_eq!(kicked.notification(), Notification::WasKicked(name("bob")));
    }
}
