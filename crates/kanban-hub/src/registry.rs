//! Identity to connection map.
//!
//! Not synchronized: the dispatcher task owns the only instance and is the
//! sole reader and writer.

use std::collections::HashMap;
use std::sync::Arc;

use kanban_core::{ConnectionId, ProjectId, UserId};

use crate::connection::Connection;

/// Who is connected, and in which room.
#[derive(Debug, Default)]
pub struct Registry {
    by_user: HashMap<UserId, Arc<Connection>>,
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for the connection's identity.
    ///
    /// Returns the connection it replaced, if any.
    pub fn insert(&mut self, conn: Arc<Connection>) -> Option<Arc<Connection>> {
        self.by_user.insert(conn.user().clone(), conn)
    }

    /// Remove the entry for `user`.
    ///
    /// With `expected` set, the entry is only removed if it is that exact
    /// connection, so a replaced connection cannot remove its successor.
    /// Absent entries are a no-op.
    pub fn remove(
        &mut self,
        user: &UserId,
        expected: Option<&ConnectionId>,
    ) -> Option<Arc<Connection>> {
        if let Some(id) = expected {
            if self.by_user.get(user).is_some_and(|c| c.id() != id) {
                return None;
            }
        }
        self.by_user.remove(user)
    }

    /// Point lookup for direct-to-user delivery.
    pub fn lookup_user(&self, user: &UserId) -> Option<&Arc<Connection>> {
        self.by_user.get(user)
    }

    /// Every connection scoped to `room`.
    pub fn lookup_room<'a>(
        &'a self,
        room: &'a ProjectId,
    ) -> impl Iterator<Item = &'a Arc<Connection>> + 'a {
        self.by_user.values().filter(move |c| c.in_room(room))
    }

    /// Every connection.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Connection>> {
        self.by_user.values()
    }

    /// Identities connected to `room`, sorted.
    pub fn online_in_room(&self, room: &ProjectId) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.lookup_room(room).map(|c| c.user().clone()).collect();
        users.sort();
        users
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.by_user.len()
    }

    /// Whether nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }

    /// Remove and return every connection.
    pub fn drain(&mut self) -> Vec<Arc<Connection>> {
        self.by_user.drain().map(|(_, c)| c).collect()
    }
}
