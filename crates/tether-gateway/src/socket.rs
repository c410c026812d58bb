//! Per-connection WebSocket loops.
//!
//! Each upgraded socket becomes two tasks:
//! - **reader**: waits for frames under a read deadline, answers `ping`,
//!   forwards `join`/`typing`/`read` to the hub, deregisters on exit.
//! - **writer**: drains the send queue and sends keepalive pings, each write
//!   under a write deadline; any failure closes the connection.
//!
//! Teardown is cooperative: whichever side stops first closes the
//! connection, and the other notices and stops too.

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tether_common::config::GatewayConfig;
use tether_common::envelope::{Envelope, Event, ReadPayload, RoomId, TypingPayload};
use tether_common::validation::validate_conversation_id;
use tokio::time::{Instant, timeout};
use uuid::Uuid;

use crate::GatewayState;
use crate::connection::{Connection, Frame, Outbound};
use crate::hub::HubHandle;

/// Run one authenticated client session to completion.
pub(crate) async fn serve(socket: WebSocket, state: Arc<GatewayState>, user_id: Uuid) {
    let (sink, stream) = socket.split();
    let (conn, outbound) = Connection::new(user_id, state.settings.send_queue_capacity);
    let session_id = conn.session_id();

    tracing::info!(session = %session_id, user = %user_id, "Client connected to gateway");
    state.hub.register(conn.clone());

    let writer = tokio::spawn(write_pump(sink, outbound, state.settings.clone()));
    read_pump(stream, &conn, &state.hub, &state.settings).await;

    state.hub.deregister(session_id);
    conn.close();
    let _ = writer.await;

    tracing::info!(session = %session_id, user = %user_id, "Client disconnected from gateway");
}

async fn read_pump(
    mut stream: SplitStream<WebSocket>,
    conn: &Connection,
    hub: &HubHandle,
    settings: &GatewayConfig,
) {
    let session_id = conn.session_id();
    loop {
        // Every inbound frame, pongs included, pushes the deadline out again.
        let next = tokio::select! {
            _ = conn.closed() => break,
            next = timeout(settings.pong_wait(), stream.next()) => next,
        };

        let msg = match next {
            Err(_) => {
                tracing::info!(session = %session_id, "Read deadline exceeded");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                tracing::debug!(session = %session_id, error = %e, "Read failed");
                break;
            }
            Ok(Some(Ok(msg))) => msg,
        };

        match msg {
            Message::Text(text) => dispatch_frame(text.as_str(), conn, hub),
            Message::Close(_) => break,
            // Ping replies are sent by axum; pong just refreshed the deadline.
            _ => {}
        }
    }
}

async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: Outbound,
    settings: GatewayConfig,
) {
    let session_id = outbound.connection().session_id();
    let mut keepalive = tokio::time::interval_at(
        Instant::now() + settings.ping_period(),
        settings.ping_period(),
    );

    loop {
        let message = tokio::select! {
            frame = outbound.next() => match frame {
                Some(frame) => Message::Text(frame),
                None => {
                    // Hub closed the queue
                    let _ = timeout(settings.write_wait(), sink.send(Message::Close(None))).await;
                    break;
                }
            },
            _ = keepalive.tick() => Message::Ping(Bytes::new()),
        };

        match timeout(settings.write_wait(), sink.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(session = %session_id, error = %e, "Write failed");
                break;
            }
            Err(_) => {
                tracing::info!(session = %session_id, "Write deadline exceeded");
                break;
            }
        }
    }

    outbound.connection().close();
}

/// Handle one inbound text frame. Malformed and unknown frames are ignored.
pub(crate) fn dispatch_frame(text: &str, conn: &Connection, hub: &HubHandle) {
    let event = match serde_json::from_str::<Event>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(session = %conn.session_id(), error = %e, "Ignoring malformed frame");
            return;
        }
    };

    match event {
        Event::Ping => {
            // Answered on this connection only; a full queue just loses the pong.
            if let Ok(pong) = Envelope::broadcast(Event::Pong).encode() {
                let _ = conn.enqueue(Frame::from(pong));
            }
        }
        Event::Join(room) => hub.join_room(conn.session_id(), RoomId::from(room)),
        Event::Typing(typing) => {
            if validate_conversation_id(&typing.conversation_id).is_err() {
                return;
            }
            let room = RoomId::conversation(&typing.conversation_id);
            hub.send_to_room(
                room,
                Event::Typing(TypingPayload {
                    user_id: Some(conn.user_id()),
                    ..typing
                }),
            );
        }
        Event::Read(read) => {
            if validate_conversation_id(&read.conversation_id).is_err() {
                return;
            }
            let room = RoomId::conversation(&read.conversation_id);
            hub.send_to_room(
                room,
                Event::Read(ReadPayload {
                    conversation_id: read.conversation_id,
                    reader_id: Some(conn.user_id()),
                }),
            );
        }
        other => {
            tracing::debug!(
                session = %conn.session_id(),
                event = other.kind(),
                "Ignoring server-only event from client"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::Hub;
    use serde_json::{Value, json};
    use std::time::Duration;

    async fn next_json(out: &mut Outbound) -> Value {
        let frame = timeout(Duration::from_millis(200), out.next())
            .await
            .unwrap()
            .unwrap();
        serde_json::from_str(frame.as_str()).unwrap()
    }

    #[tokio::test]
    async fn ping_is_answered_locally() {
        let hub = Hub::spawn();
        let (conn, mut out) = Connection::new(Uuid::new_v4(), 4);
        dispatch_frame(r#"{"type":"ping"}"#, &conn, &hub);
        assert_eq!(next_json(&mut out).await, json!({"type": "pong"}));
        // The hub never saw this connection.
        assert_eq!(hub.stats().await.unwrap().connections, 0);
    }

    #[tokio::test]
    async fn typing_reaches_the_whole_room_including_sender() {
        let hub = Hub::spawn();
        let (a, mut out_a) = Connection::new(Uuid::new_v4(), 16);
        let (b, mut out_b) = Connection::new(Uuid::new_v4(), 16);
        hub.register(a.clone());
        hub.register(b.clone());
        dispatch_frame(r#"{"type":"join","payload":"conversation:42"}"#, &a, &hub);
        dispatch_frame(r#"{"type":"join","payload":"conversation:42"}"#, &b, &hub);
        hub.stats().await.unwrap();
        let _ = next_json(&mut out_a).await; // b came online

        dispatch_frame(
            r#"{"type":"typing","payload":{"conversation_id":"42","is_typing":true,"user_id":"00000000-0000-0000-0000-000000000000"}}"#,
            &a,
            &hub,
        );
        hub.stats().await.unwrap();

        let expected = json!({
            "type": "typing",
            "room": "conversation:42",
            "payload": {"conversation_id": "42", "user_id": a.user_id(), "is_typing": true},
        });
        assert_eq!(next_json(&mut out_a).await, expected);
        assert_eq!(next_json(&mut out_b).await, expected);
    }

    #[tokio::test]
    async fn read_receipts_carry_the_reader() {
        let hub = Hub::spawn();
        let (a, mut out_a) = Connection::new(Uuid::new_v4(), 16);
        hub.register(a.clone());
        dispatch_frame(r#"{"type":"join","payload":"conversation:7"}"#, &a, &hub);
        dispatch_frame(r#"{"type":"read","payload":{"conversation_id":"7"}}"#, &a, &hub);
        hub.stats().await.unwrap();

        let frame = next_json(&mut out_a).await;
        assert_eq!(frame["type"], "read");
        assert_eq!(frame["payload"]["reader_id"], json!(a.user_id()));
        assert_eq!(frame["payload"]["conversation_id"], "7");
    }

    #[tokio::test]
    async fn junk_is_ignored() {
        let hub = Hub::spawn();
        let (a, mut out_a) = Connection::new(Uuid::new_v4(), 16);
        hub.register(a.clone());
        dispatch_frame("not json", &a, &hub);
        dispatch_frame(r#"{"type":"typing","payload":{"conversation_id":""}}"#, &a, &hub);
        dispatch_frame(
            r#"{"type":"call_ended","payload":{"call_id":"00000000-0000-0000-0000-000000000000","duration":1}}"#,
            &a,
            &hub,
        );
        hub.stats().await.unwrap();
        assert!(
            timeout(Duration::from_millis(30), out_a.next())
                .await
                .is_err()
        );
        assert!(!a.is_closed());
    }
}
