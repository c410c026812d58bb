//! End-to-end: real listener, real WebSocket clients.

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::time::Duration;
use tether_common::auth::create_access_token;
use tether_common::config::GatewayConfig;
use tether_gateway::{GatewayState, Hub, HubHandle, build_router};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use uuid::Uuid;

const SECRET: &str = "gateway-test-secret";

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start() -> (SocketAddr, HubHandle) {
    start_with(GatewayConfig::default()).await
}

async fn start_with(settings: GatewayConfig) -> (SocketAddr, HubHandle) {
    let hub = Hub::spawn();
    let state = GatewayState::new(hub.clone(), SECRET, settings);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });
    (addr, hub)
}

async fn open(addr: SocketAddr, user_id: Uuid) -> Client {
    let token = create_access_token(user_id, "customer", SECRET, 60).unwrap();
    let (ws, _) = connect_async(format!("ws://{addr}/ws?token={token}"))
        .await
        .unwrap();
    ws
}

/// Registration happens after the upgrade completes; wait for it.
async fn wait_for_connections(hub: &HubHandle, expected: usize) {
    wait_for_connections_within(hub, expected, Duration::from_secs(2)).await;
}

async fn wait_for_connections_within(hub: &HubHandle, expected: usize, limit: Duration) {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if hub.stats().await.unwrap().connections == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("hub never reached {expected} connections");
}

async fn recv_json(ws: &mut Client) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for frame")
            .unwrap()
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn send_json(ws: &mut Client, value: Value) {
    ws.send(Message::text(value.to_string())).await.unwrap();
}

#[tokio::test]
async fn upgrade_without_token_is_refused() {
    let (addr, hub) = start().await;
    assert!(connect_async(format!("ws://{addr}/ws")).await.is_err());
    assert!(
        connect_async(format!("ws://{addr}/ws?token=garbage"))
            .await
            .is_err()
    );
    assert_eq!(hub.stats().await.unwrap().connections, 0);
}

#[tokio::test]
async fn ping_gets_pong() {
    let (addr, hub) = start().await;
    let mut ws = open(addr, Uuid::new_v4()).await;
    wait_for_connections(&hub, 1).await;

    send_json(&mut ws, json!({"type": "ping"})).await;
    assert_eq!(recv_json(&mut ws).await, json!({"type": "pong"}));
}

#[tokio::test]
async fn typing_presence_and_disconnect() {
    let (addr, hub) = start().await;
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let mut a = open(addr, alice).await;
    wait_for_connections(&hub, 1).await;
    let mut b = open(addr, bob).await;
    wait_for_connections(&hub, 2).await;

    let online = recv_json(&mut a).await;
    assert_eq!(online["type"], "user_online");
    assert_eq!(online["payload"]["user_id"], json!(bob));

    send_json(&mut a, json!({"type": "join", "payload": "conversation:c9"})).await;
    send_json(&mut b, json!({"type": "join", "payload": "conversation:c9"})).await;
    // Joins are in flight through the hub; a ping round-trip on each socket
    // proves its join was read before the typing frame goes out.
    send_json(&mut a, json!({"type": "ping"})).await;
    assert_eq!(recv_json(&mut a).await["type"], "pong");
    send_json(&mut b, json!({"type": "ping"})).await;
    assert_eq!(recv_json(&mut b).await["type"], "pong");
    hub.stats().await.unwrap();

    send_json(
        &mut b,
        json!({"type": "typing", "payload": {"conversation_id": "c9", "is_typing": true}}),
    )
    .await;

    for ws in [&mut a, &mut b] {
        let typing = recv_json(ws).await;
        assert_eq!(typing["type"], "typing");
        assert_eq!(typing["room"], "conversation:c9");
        assert_eq!(typing["payload"]["user_id"], json!(bob));
        assert_eq!(typing["payload"]["is_typing"], true);
    }

    b.close(None).await.unwrap();
    wait_for_connections(&hub, 1).await;
    let offline = recv_json(&mut a).await;
    assert_eq!(offline["type"], "user_offline");
    assert_eq!(offline["payload"]["user_id"], json!(bob));
}

#[tokio::test]
async fn server_push_reaches_user_mailbox() {
    let (addr, hub) = start().await;
    let carol = Uuid::new_v4();
    let mut ws = open(addr, carol).await;
    wait_for_connections(&hub, 1).await;

    hub.send_to_user(
        carol,
        tether_common::envelope::Event::Message(json!({"text": "booking confirmed"})),
    );
    let frame = recv_json(&mut ws).await;
    assert_eq!(frame["type"], "message");
    assert_eq!(frame["room"], format!("user:{carol}"));
    assert_eq!(frame["payload"]["text"], "booking confirmed");
}

#[tokio::test]
async fn typing_works_for_any_joinable_conversation_id() {
    let (addr, hub) = start().await;
    let dave = Uuid::new_v4();
    let mut ws = open(addr, dave).await;
    wait_for_connections(&hub, 1).await;

    send_json(&mut ws, json!({"type": "join", "payload": "conversation:order.42"})).await;
    send_json(&mut ws, json!({"type": "ping"})).await;
    assert_eq!(recv_json(&mut ws).await["type"], "pong");
    hub.stats().await.unwrap();

    send_json(
        &mut ws,
        json!({"type": "typing", "payload": {"conversation_id": "order.42", "is_typing": true}}),
    )
    .await;
    let typing = recv_json(&mut ws).await;
    assert_eq!(typing["type"], "typing");
    assert_eq!(typing["room"], "conversation:order.42");
    assert_eq!(typing["payload"]["user_id"], json!(dave));

    send_json(
        &mut ws,
        json!({"type": "read", "payload": {"conversation_id": "order.42"}}),
    )
    .await;
    let read = recv_json(&mut ws).await;
    assert_eq!(read["type"], "read");
    assert_eq!(read["payload"]["reader_id"], json!(dave));
}

#[tokio::test]
async fn idle_client_is_pinged_then_dropped() {
    let (addr, hub) = start_with(GatewayConfig {
        pong_wait_secs: 2,
        ping_period_secs: 1,
        ..GatewayConfig::default()
    })
    .await;
    let mut ws = open(addr, Uuid::new_v4()).await;
    wait_for_connections(&hub, 1).await;

    // Keepalive arrives one ping period after connect.
    let first = timeout(Duration::from_secs(3), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Ping(_))) => return true,
                Some(Ok(_)) => continue,
                _ => return false,
            }
        }
    })
    .await
    .unwrap();
    assert!(first, "expected a keepalive ping");

    // Stop reading: no pongs go back, so the read deadline lapses.
    wait_for_connections_within(&hub, 0, Duration::from_secs(6)).await;
    let stats = hub.stats().await.unwrap();
    assert_eq!(stats.rooms, 0);
    assert_eq!(stats.online_users, 0);
    drop(ws);
}

#[tokio::test]
async fn vanished_client_is_deregistered() {
    let (addr, hub) = start().await;
    let (erin, frank) = (Uuid::new_v4(), Uuid::new_v4());
    let mut watcher = open(addr, erin).await;
    wait_for_connections(&hub, 1).await;
    let gone = open(addr, frank).await;
    wait_for_connections(&hub, 2).await;
    assert_eq!(recv_json(&mut watcher).await["type"], "user_online");

    // Transport dropped without a close handshake.
    drop(gone);
    wait_for_connections(&hub, 1).await;
    assert!(!hub.is_online(frank).await.unwrap());

    let offline = recv_json(&mut watcher).await;
    assert_eq!(offline["type"], "user_offline");
    assert_eq!(offline["payload"]["user_id"], json!(frank));
}
