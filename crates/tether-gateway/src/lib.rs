//! # tether-gateway
//!
//! Real-time WebSocket hub for Tether. Handles:
//! - Authenticated connection upgrade
//! - Per-user mailbox rooms and per-conversation rooms
//! - Fan-out with per-connection backpressure (slow clients are dropped)
//! - Presence (online/offline) derived from connection lifecycle
//! - Heartbeat/keepalive and read/write deadlines
//!
//! Wire frames are JSON objects tagged by `type`; see
//! [`tether_common::envelope`].

pub mod connection;
pub mod hub;
pub mod presence;
pub mod rooms;
mod socket;

pub use connection::{Connection, Frame, Outbound, SessionId};
pub use hub::{Hub, HubClosed, HubHandle, HubStats};

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    http::{HeaderMap, Uri},
    response::Response,
    routing::get,
};
use std::sync::Arc;
use tether_common::{auth, config::GatewayConfig, error::TetherError};

/// Gateway state.
#[derive(Clone)]
pub struct GatewayState {
    pub hub: HubHandle,
    pub jwt_secret: String,
    pub settings: GatewayConfig,
}

impl GatewayState {
    pub fn new(hub: HubHandle, jwt_secret: impl Into<String>, settings: GatewayConfig) -> Self {
        Self {
            hub,
            jwt_secret: jwt_secret.into(),
            settings,
        }
    }
}

/// Build the gateway WebSocket router.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(Arc::new(state))
}

/// WebSocket upgrade handler. The token comes from `Authorization: Bearer`
/// or, for browsers that can't set headers on upgrade, `?token=`.
async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    uri: Uri,
    State(state): State<Arc<GatewayState>>,
) -> Result<Response, TetherError> {
    let token = auth::request_token(&headers, &uri).ok_or(TetherError::Unauthorized)?;
    let identity = auth::authenticate(&token, &state.jwt_secret)?;

    Ok(ws.on_upgrade(move |socket| socket::serve(socket, state, identity.user_id)))
}
