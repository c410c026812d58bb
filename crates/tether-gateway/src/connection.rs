//! One live client session.
//!
//! A [`Connection`] is the cheap, cloneable handle the hub keeps in its
//! registry. Its only shared mutable state is the bounded outbound queue and
//! the closed flag; the matching [`Outbound`] is drained by exactly one
//! writer task.

use axum::extract::ws::Utf8Bytes;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

/// A serialized envelope, shared between every member of a fan-out.
pub type Frame = Utf8Bytes;

/// Identifies one connection, unique across reconnects.
pub type SessionId = Uuid;

struct Shared {
    session_id: SessionId,
    user_id: Uuid,
    outbound: mpsc::Sender<Frame>,
    closed: watch::Sender<bool>,
}

/// Handle to a live connection.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Shared>,
}

/// Receiving half of a connection's send queue.
pub struct Outbound {
    rx: mpsc::Receiver<Frame>,
    conn: Connection,
}

impl Connection {
    /// Create a connection for `user_id` with a send queue of `capacity` frames.
    pub fn new(user_id: Uuid, capacity: usize) -> (Self, Outbound) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (closed, _) = watch::channel(false);
        let conn = Self {
            inner: Arc::new(Shared {
                session_id: tether_common::ids::generate_session_id(),
                user_id,
                outbound: tx,
                closed,
            }),
        };
        let outbound = Outbound {
            rx,
            conn: conn.clone(),
        };
        (conn, outbound)
    }

    pub fn session_id(&self) -> SessionId {
        self.inner.session_id
    }

    pub fn user_id(&self) -> Uuid {
        self.inner.user_id
    }

    /// Try to queue a frame for delivery. Never waits.
    ///
    /// Returns `false` if the queue is full, the writer is gone, or the
    /// connection has been closed; the caller should treat it as dead.
    pub fn enqueue(&self, frame: Frame) -> bool {
        if self.is_closed() {
            return false;
        }
        self.inner.outbound.try_send(frame).is_ok()
    }

    /// Mark the connection closed. Returns `true` only for the first call.
    pub fn close(&self) -> bool {
        !self.inner.closed.send_replace(true)
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        let mut rx = self.inner.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("session_id", &self.inner.session_id)
            .field("user_id", &self.inner.user_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Outbound {
    /// Next queued frame, or `None` once the connection is closed.
    ///
    /// Closing wins over queued frames: nothing is handed out after close.
    pub async fn next(&mut self) -> Option<Frame> {
        if self.conn.is_closed() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.conn.closed() => None,
            frame = self.rx.recv() => frame,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
