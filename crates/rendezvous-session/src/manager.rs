//! The session manager: tracks every live connection.
//!
//! # Concurrency note
//!
//! `SessionManager` is NOT thread-safe by itself — it uses a plain
//! `HashMap`. The server owns it inside the relay state, behind the same
//! mutex that guards the room registries, so a membership change and the
//! deliveries it causes are never interleaved with another event.

use std::collections::HashMap;

use rendezvous_protocol::{ConnectionId, ServerEvent};

use crate::{Outbox, Session, SessionError, default_display_name};

/// Registry of all connected sessions, keyed by connection id.
///
/// ```text
/// accept ──→ create() ──→ set_display_name()* ──→ remove() ──→ gone
///                 │                                   ▲
///                 └──────── deliver() (any time) ─────┘
/// ```
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: HashMap<ConnectionId, Session>,
}

impl SessionManager {
    /// Creates a new, empty session manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly accepted connection.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyConnected`] if the id is already
    /// registered.
    pub fn create(
        &mut self,
        conn_id: ConnectionId,
        outbox: Outbox,
    ) -> Result<&Session, SessionError> {
        if self.sessions.contains_key(&conn_id) {
            return Err(SessionError::AlreadyConnected(conn_id));
        }

        let session = self
            .sessions
            .entry(conn_id)
            .or_insert_with(|| Session::new(conn_id, outbox));

        tracing::debug!(%conn_id, "session created");
        Ok(session)
    }

    /// Removes a connection's session. Pending deliveries already queued
    /// in its outbox are unaffected; new ones are dropped.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if the id is unknown.
    pub fn remove(
        &mut self,
        conn_id: ConnectionId,
    ) -> Result<Session, SessionError> {
        let session = self
            .sessions
            .remove(&conn_id)
            .ok_or(SessionError::NotFound(conn_id))?;

        tracing::debug!(
            %conn_id,
            connected_for = ?session.connected_at.elapsed(),
            "session removed"
        );
        Ok(session)
    }

    /// Records the display name a client chose.
    ///
    /// Surrounding whitespace is dropped. A blank name clears the choice,
    /// so the connection falls back to its default name.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if the id is unknown.
    pub fn set_display_name(
        &mut self,
        conn_id: ConnectionId,
        name: &str,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&conn_id)
            .ok_or(SessionError::NotFound(conn_id))?;
        let name = name.trim();
        session.display_name = (!name.is_empty()).then(|| name.to_owned());
        Ok(())
    }

    /// Picks the name to use for a join without recording it.
    ///
    /// A non-blank `requested` name wins; otherwise the session's current
    /// name (or the id-derived default) is used. The caller stores the
    /// result with [`set_display_name`](Self::set_display_name) once the
    /// join has gone through.
    pub fn preferred_display_name(
        &self,
        conn_id: ConnectionId,
        requested: Option<&str>,
    ) -> String {
        match requested.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_owned(),
            None => self.display_name(conn_id),
        }
    }

    /// The display name for a connection, defaulted if unset or unknown.
    pub fn display_name(&self, conn_id: ConnectionId) -> String {
        self.sessions
            .get(&conn_id)
            .map(Session::display_name)
            .unwrap_or_else(|| default_display_name(conn_id))
    }

    /// Queues an event for one connection.
    ///
    /// Returns `false` if the connection is unknown or its writer is gone.
    /// Stale targets are expected (a peer may disconnect between an event
    /// being produced and delivered) and are not an error.
    pub fn deliver(&self, to: ConnectionId, event: ServerEvent) -> bool {
        match self.sessions.get(&to) {
            Some(session) => session.send(event),
            None => {
                tracing::debug!(%to, "dropping event for unknown connection");
                false
            }
        }
    }

    /// Looks up a session.
    pub fn get(&self, conn_id: &ConnectionId) -> Option<&Session> {
        self.sessions.get(conn_id)
    }

    /// Returns the number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
