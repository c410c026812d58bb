//! Room registry: who is subscribed to which room.
//!
//! Two indexes, always updated together:
//! - `rooms`: room → members (fan-out lookup)
//! - `memberships`: session → rooms (cleanup on disconnect)
//!
//! Rooms exist only while they have members. Only the hub task mutates this.

use std::collections::{HashMap, HashSet};
use tether_common::envelope::RoomId;

use crate::connection::{Connection, SessionId};

#[derive(Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, HashMap<SessionId, Connection>>,
    memberships: HashMap<SessionId, HashSet<RoomId>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `conn` to `room`, creating the room on first join.
    /// Returns `false` if it was already a member.
    pub fn join(&mut self, room: RoomId, conn: &Connection) -> bool {
        let inserted = self
            .rooms
            .entry(room.clone())
            .or_default()
            .insert(conn.session_id(), conn.clone())
            .is_none();
        self.memberships
            .entry(conn.session_id())
            .or_default()
            .insert(room);
        inserted
    }

    /// Remove a session from every room it joined. Returns the rooms it left.
    pub fn leave_all(&mut self, session_id: SessionId) -> Vec<RoomId> {
        let Some(joined) = self.memberships.remove(&session_id) else {
            return Vec::new();
        };

        let mut left = Vec::with_capacity(joined.len());
        for room in joined {
            if let Some(members) = self.rooms.get_mut(&room) {
                members.remove(&session_id);
                if members.is_empty() {
                    self.rooms.remove(&room);
                }
            }
            left.push(room);
        }
        left
    }

    /// Snapshot of the current members of `room`. An unknown room is empty.
    pub fn members_of(&self, room: &RoomId) -> Vec<Connection> {
        self.rooms
            .get(room)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Rooms a session currently belongs to.
    pub fn rooms_of(&self, session_id: SessionId) -> Vec<RoomId> {
        self.memberships
            .get(&session_id)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
