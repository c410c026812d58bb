//! Presence tracking, derived from connection lifecycle.
//!
//! A user with several devices has several connections; each one produces its
//! own online and offline event. The per-user count answers `is_online`.

use std::collections::HashMap;
use tether_common::envelope::{Envelope, Event, PresencePayload};
use uuid::Uuid;

#[derive(Default)]
pub struct PresenceTracker {
    live: HashMap<Uuid, usize>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new connection for `user_id`; returns the event to broadcast.
    pub fn connected(&mut self, user_id: Uuid) -> Envelope {
        *self.live.entry(user_id).or_default() += 1;
        Envelope::broadcast(Event::UserOnline(PresencePayload { user_id }))
    }

    /// Record a closed connection for `user_id`; returns the event to broadcast.
    pub fn disconnected(&mut self, user_id: Uuid) -> Envelope {
        if let Some(count) = self.live.get_mut(&user_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.live.remove(&user_id);
            }
        }
        Envelope::broadcast(Event::UserOffline(PresencePayload { user_id }))
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.live.contains_key(&user_id)
    }

    pub fn online_count(&self) -> usize {
        self.live.len()
    }
}
