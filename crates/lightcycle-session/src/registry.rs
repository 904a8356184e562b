//! The set of all known players.
//!
//! `SessionRegistry` is NOT thread-safe by itself. It is owned by the
//! matchmaker task and only ever touched from there, so plain maps are
//! enough.

use std::collections::{BTreeMap, HashMap};

use lightcycle_transport::{ConnectionHandle, ConnectionId};
use tracing::info;

use crate::store::PlayerRecords;
use crate::{PlayerSession, SessionError};

/// All sessions, keyed by username.
///
/// A `BTreeMap` keeps iteration in username order, which makes the
/// participant order of a new match deterministic.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<String, PlayerSession>,
    /// Which session each bound connection belongs to.
    bindings: HashMap<ConnectionId, String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds sessions from stored records. None of them is connected.
    pub fn from_records(records: PlayerRecords) -> Self {
        let sessions = records
            .into_iter()
            .map(|(username, record)| {
                let session = PlayerSession::from_record(username.clone(), record);
                (username, session)
            })
            .collect();
        Self {
            sessions,
            bindings: HashMap::new(),
        }
    }

    /// Snapshot of every session's persisted state.
    pub fn to_records(&mut self) -> PlayerRecords {
        self.sessions
            .iter_mut()
            .map(|(username, session)| (username.clone(), session.to_record()))
            .collect()
    }

    /// Adds a new session.
    ///
    /// # Errors
    /// [`SessionError::AlreadyExists`] if the username is taken.
    pub fn insert(&mut self, session: PlayerSession) -> Result<&mut PlayerSession, SessionError> {
        use std::collections::btree_map::Entry;
        match self.sessions.entry(session.username().to_string()) {
            Entry::Occupied(e) => Err(SessionError::AlreadyExists(e.key().clone())),
            Entry::Vacant(e) => {
                info!(username = %session.username(), "new player");
                Ok(e.insert(session))
            }
        }
    }

    pub fn get(&self, username: &str) -> Option<&PlayerSession> {
        self.sessions.get(username)
    }

    pub fn get_mut(&mut self, username: &str) -> Option<&mut PlayerSession> {
        self.sessions.get_mut(username)
    }

    pub fn contains(&self, username: &str) -> bool {
        self.sessions.contains_key(username)
    }

    /// Binds `conn` to the session named `username`, evicting whatever was
    /// bound before. Returns `true` if a live connection was evicted.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if there is no such session.
    pub fn bind(&mut self, username: &str, conn: ConnectionHandle) -> Result<bool, SessionError> {
        let session = self
            .sessions
            .get_mut(username)
            .ok_or_else(|| SessionError::NotFound(username.to_string()))?;
        if let Some(old) = session.connection_id() {
            self.bindings.remove(&old);
        }
        self.bindings.insert(conn.id(), username.to_string());
        Ok(session.bind_connection(conn))
    }

    /// Releases connection `id`. Returns the username it was bound to,
    /// if it still was.
    pub fn unbind(&mut self, id: ConnectionId) -> Option<String> {
        let username = self.bindings.remove(&id)?;
        let session = self.sessions.get_mut(&username)?;
        session.connection_lost(id).then_some(username)
    }

    /// The session bound to connection `id`.
    ///
    /// # Errors
    /// [`SessionError::Unbound`] if no session is bound to it.
    pub fn by_connection_mut(
        &mut self,
        id: ConnectionId,
    ) -> Result<&mut PlayerSession, SessionError> {
        self.bindings
            .get(&id)
            .and_then(|username| self.sessions.get_mut(username))
            .ok_or(SessionError::Unbound(id))
    }

    /// Usernames of sessions with a live connection, in username order.
    pub fn connected(&self) -> Vec<String> {
        self.sessions
            .values()
            .filter(|s| s.is_connected())
            .map(|s| s.username().to_string())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerSession> {
        self.sessions.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PlayerSession> {
        self.sessions.values_mut()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
