//! Registry actor - owns all session state and processes commands.
//!
//! The RegistryActor is the single owner of the live session map.
//! It receives commands via an mpsc channel and answers on oneshot channels.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Response send failures are ignored (the caller went away)

use std::collections::HashMap;

use tcpchat_core::{DisplayName, SessionId};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::commands::{RegistryCommand, RegistryError, SessionEntry};

// ============================================================================
// Registry Actor
// ============================================================================

/// The registry actor - owns all session state.
///
/// # Ownership
///
/// The actor owns:
/// - `sessions`: entries keyed by connection identity (primary key)
/// - `names`: index from display name to the session holding it
///
/// Both maps are only touched from the actor task, so every command is
/// applied atomically and the two maps never disagree.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Primary storage: SessionId → SessionEntry
    sessions: HashMap<SessionId, SessionEntry>,

    /// Name index: DisplayName → SessionId
    names: HashMap<DisplayName, SessionId>,
}

impl RegistryActor {
    /// Creates a new registry actor.
    pub fn new(receiver: mpsc::Receiver<RegistryCommand>) -> Self {
        Self {
            receiver,
            sessions: HashMap::new(),
            names: HashMap::new(),
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all handles dropped).
    pub async fn run(mut self) {
        debug!("Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(sessions = self.sessions.len(), "Registry actor stopped");
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register { entry, respond_to } => {
                let result = self.handle_register(*entry);
                // Ignore send error - caller may have dropped the receiver
                let _ = respond_to.send(result);
            }
            RegistryCommand::Rename {
                session_id,
                name,
                respond_to,
            } => {
                let result = self.handle_rename(session_id, name);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Unregister {
                session_id,
                respond_to,
            } => {
                let result = self.handle_unregister(session_id);
                let _ = respond_to.send(result);
            }
            RegistryCommand::NameExists { name, respond_to } => {
                let _ = respond_to.send(self.names.contains_key(&name));
            }
            RegistryCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.sessions.values().cloned().collect());
            }
            RegistryCommand::Drain { respond_to } => {
                let drained = self.handle_drain();
                let _ = respond_to.send(drained);
            }
            RegistryCommand::Count { respond_to } => {
                let _ = respond_to.send(self.sessions.len());
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn handle_register(&mut self, entry: SessionEntry) -> Result<(), RegistryError> {
        if self.sessions.contains_key(&entry.id) {
            return Err(RegistryError::SessionAlreadyExists {
                session_id: entry.id,
            });
        }

        if self.names.contains_key(&entry.name) {
            debug!(session = %entry.id, name = %entry.name, "Name taken, rejecting registration");
            return Err(RegistryError::NameTaken { name: entry.name });
        }

        debug!(session = %entry.id, name = %entry.name, peer = %entry.peer, "Session registered");
        self.names.insert(entry.name.clone(), entry.id);
        self.sessions.insert(entry.id, entry);
        Ok(())
    }

    fn handle_rename(
        &mut self,
        session_id: SessionId,
        name: DisplayName,
    ) -> Result<DisplayName, RegistryError> {
        match self.names.get(&name) {
            Some(holder) if *holder != session_id => {
                return Err(RegistryError::NameTaken { name });
            }
            _ => {}
        }

        let entry = self
            .sessions
            .get_mut(&session_id)
            .ok_or(RegistryError::SessionNotFound { session_id })?;

        let old = std::mem::replace(&mut entry.name, name.clone());
        self.names.remove(&old);
        self.names.insert(name, session_id);

        debug!(session = %session_id, old = %old, new = %entry.name, "Session renamed");
        Ok(old)
    }

    fn handle_unregister(&mut self, session_id: SessionId) -> Option<SessionEntry> {
        let entry = self.sessions.remove(&session_id)?;
        self.names.remove(&entry.name);
        debug!(session = %session_id, name = %entry.name, "Session unregistered");
        Some(entry)
    }

    fn handle_drain(&mut self) -> Vec<SessionEntry> {
        self.names.clear();
        let drained: Vec<SessionEntry> = self.sessions.drain().map(|(_, entry)| entry).collect();
        debug!(count = drained.len(), "Registry drained");
        drained
    }
}
