//! Registry actor - owns all membership state and processes commands.
//!
//! The RegistryActor is the single owner of the live-session set and the
//! claimed-name set. It receives commands via an mpsc channel and publishes
//! events via broadcast.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel send failures are logged but don't panic

use std::collections::{BTreeMap, HashMap};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use relay_core::{DisplayName, SessionId};
use relay_protocol::{strip_sender_prefix, Notification};

use super::commands::{
    Outbound, Outbox, RegistryCommand, RegistryError, RegistryEvent, RemovalReason,
};

/// A live session as seen by the registry.
struct Member {
    name: DisplayName,
    outbox: Outbox,
}

/// The registry actor - owns all membership state.
///
/// # Ownership
///
/// The actor owns:
/// - `members`: live sessions keyed by connection
/// - `names`: index from claimed name to the connection holding it
///
/// Both maps are only touched inside `handle_command`, which runs on the
/// actor's task one command at a time. A session is live exactly when it has
/// an entry in `members`, and every member's name has exactly one entry in
/// `names` pointing back at it.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Live sessions: SessionId → (name, outbox)
    members: HashMap<SessionId, Member>,

    /// Claimed names in lexicographic order → owning session
    names: BTreeMap<DisplayName, SessionId>,

    /// Event publisher for observers (transcript, tests)
    event_publisher: broadcast::Sender<RegistryEvent>,
}

impl RegistryActor {
    /// Creates a new registry actor.
    ///
    /// # Arguments
    ///
    /// * `receiver` - Channel for receiving commands
    /// * `event_publisher` - Broadcast channel for publishing events
    pub fn new(
        receiver: mpsc::Receiver<RegistryCommand>,
        event_publisher: broadcast::Sender<RegistryEvent>,
    ) -> Self {
        Self {
            receiver,
            members: HashMap::new(),
            names: BTreeMap::new(),
            event_publisher,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    pub async fn run(mut self) {
        info!("Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(members = self.members.len(), "Registry actor stopped");
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register {
                session_id,
                name,
                outbox,
                respond_to,
            } => {
                let result = self.handle_register(session_id, &name, outbox);
                // Ignore send error - the session may have gone away
                let _ = respond_to.send(result);
            }
            RegistryCommand::Chat {
                session_id,
                text,
                respond_to,
            } => {
                let result = self.handle_chat(session_id, &text);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Broadcast {
                notification,
                respond_to,
            } => {
                let delivered = self.handle_broadcast(notification);
                let _ = respond_to.send(delivered);
            }
            RegistryCommand::Remove {
                session_id,
                reason,
                respond_to,
            } => {
                let removed = self.handle_remove(session_id, reason);
                let _ = respond_to.send(removed);
            }
            RegistryCommand::Kick {
                issuer,
                target,
                respond_to,
            } => {
                let result = self.handle_kick(issuer, &target);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.handle_snapshot());
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    /// Claims a name for a session and announces it.
    ///
    /// Nothing is mutated unless every check passes.
    fn handle_register(
        &mut self,
        session_id: SessionId,
        raw_name: &str,
        outbox: Outbox,
    ) -> Result<DisplayName, RegistryError> {
        if let Some(member) = self.members.get(&session_id) {
            debug!(
                session_id = %session_id,
                name = %member.name,
                "Session already joined, rejecting registration"
            );
            return Err(RegistryError::AlreadyJoined {
                session_id,
                name: member.name.clone(),
            });
        }

        let name = DisplayName::parse(raw_name)?;

        if let Some(owner) = self.names.get(&name) {
            debug!(
                session_id = %session_id,
                owner = %owner,
                name = %name,
                "Name already claimed, rejecting registration"
            );
            return Err(RegistryError::NameTaken(name));
        }

        self.names.insert(name.clone(), session_id);
        self.members.insert(
            session_id,
            Member {
                name: name.clone(),
                outbox: outbox.clone(),
            },
        );

        info!(
            session_id = %session_id,
            name = %name,
            total_members = self.members.len(),
            "Session joined"
        );

        // Everyone, including the newcomer, hears about the join first
        self.fan_out(&Notification::Joined(name.clone()));
        let roster = Notification::user_list(self.names.keys());
        if outbox.send(Outbound::Line(roster.to_line())).is_err() {
            debug!(session_id = %session_id, "Newcomer writer already gone");
        }

        let _ = self.event_publisher.send(RegistryEvent::Joined {
            session_id,
            name: name.clone(),
        });

        Ok(name)
    }

    /// Relays chat under the sender's registered name.
    fn handle_chat(&self, session_id: SessionId, text: &str) -> Result<(), RegistryError> {
        let from = match self.members.get(&session_id) {
            Some(member) => member.name.clone(),
            None => return Err(RegistryError::NotJoined(session_id)),
        };

        let notification = Notification::Chat {
            text: strip_sender_prefix(text, from.as_str()).to_string(),
            from,
        };
        let recipients = self.fan_out(&notification);

        let _ = self.event_publisher.send(RegistryEvent::Relayed {
            notification,
            recipients,
        });

        Ok(())
    }

    /// Fans an arbitrary notification out to every live session.
    fn handle_broadcast(&self, notification: Notification) -> usize {
        let recipients = self.fan_out(&notification);

        debug!(recipients, "Broadcast delivered");

        let _ = self.event_publisher.send(RegistryEvent::Relayed {
            notification,
            recipients,
        });

        recipients
    }

    /// Removes a session, frees its name, and tells the remaining sessions.
    fn handle_remove(&mut self, session_id: SessionId, reason: RemovalReason) -> bool {
        let Some(member) = self.members.remove(&session_id) else {
            debug!(
                session_id = %session_id,
                reason = %reason,
                "Session not live, nothing to remove"
            );
            return false;
        };

        self.names.remove(&member.name);

        info!(
            session_id = %session_id,
            name = %member.name,
            reason = %reason,
            remaining_members = self.members.len(),
            "Session removed"
        );

        let event = RegistryEvent::Removed {
            session_id,
            name: member.name,
            reason,
        };
        self.fan_out(&event.notification());
        let _ = self.event_publisher.send(event);

        true
    }

    /// Disconnects the session holding `target`, if any.
    fn handle_kick(
        &mut self,
        issuer: Option<SessionId>,
        target: &str,
    ) -> Result<bool, RegistryError> {
        if let Some(issuer) = issuer {
            if !self.members.contains_key(&issuer) {
                debug!(session_id = %issuer, target = %target, "Kick from non-member refused");
                return Err(RegistryError::NotJoined(issuer));
            }
        }

        let Ok(name) = DisplayName::parse(target) else {
            debug!(target = %target, "Kick target is not a valid name, ignoring");
            return Ok(false);
        };

        let Some(session_id) = self.names.get(&name).copied() else {
            debug!(name = %name, "Kick target not found, ignoring");
            return Ok(false);
        };

        // Final line and close are queued before removal so the writer sends
        // the notice before shutting the socket down
        if let Some(member) = self.members.get(&session_id) {
            let _ = member
                .outbox
                .send(Outbound::Line(Notification::YouWereKicked.to_line()));
            let _ = member.outbox.send(Outbound::Close);
        }

        Ok(self.handle_remove(session_id, RemovalReason::Kicked))
    }

    /// Returns the claimed names in lexicographic order.
    fn handle_snapshot(&self) -> Vec<DisplayName> {
        self.names.keys().cloned().collect()
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Queues one copy of `notification` on every live session's outbox.
    ///
    /// Returns the number of outboxes that accepted it. A closed outbox means
    /// the session is tearing down; its own cleanup will remove it.
    fn fan_out(&self, notification: &Notification) -> usize {
        let line = notification.to_line();
        let mut delivered = 0;

        for (session_id, member) in &self.members {
            if member.outbox.send(Outbound::Line(line.clone())).is_ok() {
                delivered += 1;
            } else {
                debug!(session_id = %session_id, "Outbox closed, skipping");
            }
        }

        delivered
    }

    /// Returns the number of live sessions.
    #[cfg(test)]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}
