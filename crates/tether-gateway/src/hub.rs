//! The hub, single owner of every live connection and room membership.
//!
//! ```text
//!   reader tasks ─┐
//!   REST / calls ─┼──▶ HubCommand (unbounded mpsc) ──▶ hub task ──try_send──▶ per-connection queue ──▶ writer task
//!   presence     ─┘
//! ```
//!
//! All mutations and fan-out run on one task in command order, so a register
//! and a fan-out can never observe a half-updated room. Nothing the hub task
//! does can wait on a client: delivery is `try_send`, and a member whose
//! queue is full is evicted on the spot.

use serde::Serialize;
use std::collections::HashMap;
use tether_common::envelope::{Envelope, Event, RoomId};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::connection::{Connection, Frame, SessionId};
use crate::presence::PresenceTracker;
use crate::rooms::RoomRegistry;

/// Commands processed by the hub task.
#[derive(Debug)]
pub enum HubCommand {
    /// Add a connection and subscribe it to its user's mailbox room.
    Register(Connection),
    /// Remove a connection from everything and close its queue.
    Deregister(SessionId),
    /// Subscribe a connection to a room.
    JoinRoom { session_id: SessionId, room: RoomId },
    /// Deliver to every member of `envelope.room`, or to everyone if it has none.
    Send(Envelope),
    /// Current members of a room.
    MembersOf {
        room: RoomId,
        respond_to: oneshot::Sender<Vec<SessionId>>,
    },
    /// Whether a user has at least one live connection.
    IsOnline {
        user_id: Uuid,
        respond_to: oneshot::Sender<bool>,
    },
    Stats {
        respond_to: oneshot::Sender<HubStats>,
    },
}

/// Point-in-time hub statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub connections: usize,
    pub rooms: usize,
    pub online_users: usize,
}

/// The hub task has stopped.
#[derive(Debug, thiserror::Error)]
#[error("hub is not running")]
pub struct HubClosed;

/// Cheap, cloneable front door to the hub. Every method returns immediately.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    fn submit(&self, cmd: HubCommand) {
        if self.tx.send(cmd).is_err() {
            tracing::debug!("Hub stopped, dropping command");
        }
    }

    pub fn register(&self, conn: Connection) {
        self.submit(HubCommand::Register(conn));
    }

    pub fn deregister(&self, session_id: SessionId) {
        self.submit(HubCommand::Deregister(session_id));
    }

    pub fn join_room(&self, session_id: SessionId, room: RoomId) {
        self.submit(HubCommand::JoinRoom { session_id, room });
    }

    /// Fan `event` out to every current member of `room`.
    pub fn send_to_room(&self, room: RoomId, event: Event) {
        self.submit(HubCommand::Send(Envelope::to_room(room, event)));
    }

    /// Address a user's mailbox room. Dropped silently if they are offline.
    pub fn send_to_user(&self, user_id: Uuid, event: Event) {
        self.send_to_room(RoomId::user(user_id), event);
    }

    /// Deliver to every live connection.
    pub fn broadcast(&self, event: Event) {
        self.submit(HubCommand::Send(Envelope::broadcast(event)));
    }

    /// Push a chat message to everyone watching a conversation.
    pub fn broadcast_to_conversation(&self, conversation_id: &str, payload: serde_json::Value) {
        self.send_to_room(RoomId::conversation(conversation_id), Event::Message(payload));
    }

    async fn query<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> HubCommand,
    ) -> Result<T, HubClosed> {
        let (respond_to, rx) = oneshot::channel();
        self.tx.send(build(respond_to)).map_err(|_| HubClosed)?;
        rx.await.map_err(|_| HubClosed)
    }

    /// Session ids currently in `room`. Reflects every command submitted before it.
    pub async fn members_of(&self, room: RoomId) -> Result<Vec<SessionId>, HubClosed> {
        self.query(|respond_to| HubCommand::MembersOf { room, respond_to })
            .await
    }

    pub async fn is_online(&self, user_id: Uuid) -> Result<bool, HubClosed> {
        self.query(|respond_to| HubCommand::IsOnline {
            user_id,
            respond_to,
        })
        .await
    }

    pub async fn stats(&self) -> Result<HubStats, HubClosed> {
        self.query(|respond_to| HubCommand::Stats { respond_to })
            .await
    }
}

/// Hub state. Owned by the hub task; reached only through [`HubHandle`].
pub struct Hub {
    rx: mpsc::UnboundedReceiver<HubCommand>,
    connections: HashMap<SessionId, Connection>,
    rooms: RoomRegistry,
    presence: PresenceTracker,
}

impl Hub {
    pub fn new() -> (Self, HubHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Self {
            rx,
            connections: HashMap::new(),
            rooms: RoomRegistry::new(),
            presence: PresenceTracker::new(),
        };
        (hub, HubHandle { tx })
    }

    /// Start the hub on the current runtime.
    pub fn spawn() -> HubHandle {
        let (hub, handle) = Self::new();
        tokio::spawn(hub.run());
        handle
    }

    /// Process commands until every [`HubHandle`] is dropped.
    pub async fn run(mut self) {
        tracing::info!("Hub started");
        while let Some(cmd) = self.rx.recv().await {
            self.handle(cmd);
        }
        for conn in self.connections.values() {
            conn.close();
        }
        tracing::info!(connections = self.connections.len(), "Hub stopped");
    }

    fn handle(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Register(conn) => self.register(conn),
            HubCommand::Deregister(session_id) => self.evict(vec![session_id]),
            HubCommand::JoinRoom { session_id, room } => self.join_room(session_id, room),
            HubCommand::Send(envelope) => {
                let targets = match &envelope.room {
                    Some(room) => {
                        let members = self.rooms.members_of(room);
                        if members.is_empty() {
                            tracing::debug!(room = %room, event = envelope.event.kind(), "No live members, dropping");
                        }
                        members
                    }
                    None => self.connections.values().cloned().collect(),
                };
                let stalled = deliver(&targets, &envelope);
                self.evict(stalled);
            }
            HubCommand::MembersOf { room, respond_to } => {
                let members = self
                    .rooms
                    .members_of(&room)
                    .iter()
                    .map(Connection::session_id)
                    .collect();
                let _ = respond_to.send(members);
            }
            HubCommand::IsOnline {
                user_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.presence.is_online(user_id));
            }
            HubCommand::Stats { respond_to } => {
                let _ = respond_to.send(HubStats {
                    connections: self.connections.len(),
                    rooms: self.rooms.room_count(),
                    online_users: self.presence.online_count(),
                });
            }
        }
    }

    fn register(&mut self, conn: Connection) {
        let session_id = conn.session_id();
        if self.connections.contains_key(&session_id) {
            tracing::warn!(session = %session_id, "Connection registered twice, ignoring");
            return;
        }

        self.connections.insert(session_id, conn.clone());
        self.rooms.join(RoomId::user(conn.user_id()), &conn);
        tracing::info!(
            session = %session_id,
            user = %conn.user_id(),
            total = self.connections.len(),
            "Connection registered"
        );

        let online = self.presence.connected(conn.user_id());
        let others: Vec<Connection> = self
            .connections
            .values()
            .filter(|c| c.session_id() != session_id)
            .cloned()
            .collect();
        let stalled = deliver(&others, &online);
        self.evict(stalled);
    }

    fn join_room(&mut self, session_id: SessionId, room: RoomId) {
        let Some(conn) = self.connections.get(&session_id) else {
            tracing::debug!(session = %session_id, room = %room, "Join for unknown connection");
            return;
        };

        // Mailboxes are private to their owner
        if room.is_mailbox() && room.mailbox_owner() != Some(conn.user_id()) {
            tracing::warn!(
                session = %session_id,
                user = %conn.user_id(),
                room = %room,
                "Refusing join of another user's mailbox"
            );
            return;
        }

        let conn = conn.clone();
        if self.rooms.join(room.clone(), &conn) {
            tracing::debug!(
                session = %session_id,
                room = %room,
                memberships = self.rooms.rooms_of(session_id).len(),
                "Joined room"
            );
        }
    }

    /// Remove connections, emitting `user_offline` for each. Offline fan-out
    /// can itself find stalled members; those are evicted in the same pass.
    fn evict(&mut self, mut pending: Vec<SessionId>) {
        while let Some(session_id) = pending.pop() {
            let Some(conn) = self.connections.remove(&session_id) else {
                continue;
            };
            let left = self.rooms.leave_all(session_id);
            conn.close();
            tracing::info!(
                session = %session_id,
                user = %conn.user_id(),
                rooms_left = left.len(),
                total = self.connections.len(),
                "Connection deregistered"
            );

            let offline = self.presence.disconnected(conn.user_id());
            let everyone: Vec<Connection> = self.connections.values().cloned().collect();
            pending.extend(deliver(&everyone, &offline));
        }
    }
}

/// Serialize once and offer the frame to each target.
/// Returns the targets that could not accept it.
fn deliver(targets: &[Connection], envelope: &Envelope) -> Vec<SessionId> {
    if targets.is_empty() {
        return Vec::new();
    }

    let frame = match envelope.encode() {
        Ok(text) => Frame::from(text),
        Err(e) => {
            tracing::error!(event = envelope.event.kind(), error = %e, "Failed to encode envelope");
            return Vec::new();
        }
    };

    targets
        .iter()
        .filter(|conn| {
            let accepted = conn.enqueue(frame.clone());
            if !accepted && !conn.is_closed() {
                tracing::warn!(
                    session = %conn.session_id(),
                    user = %conn.user_id(),
                    event = envelope.event.kind(),
                    "Send queue full, dropping slow connection"
                );
            }
            !accepted
        })
        .map(Connection::session_id)
        .collect()
}
