//! # tether-api
//!
//! REST API layer for Tether: call signaling endpoints and the health check.
//! Real-time delivery lives in `tether-gateway`; handlers here only talk to
//! it through the hub handle.

pub mod middleware;
pub mod routes;

use axum::Router;
use std::sync::Arc;
use tether_calls::CallSignaling;
use tether_db::Database;
use tether_gateway::HubHandle;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub calls: CallSignaling,
    pub hub: HubHandle,
    pub jwt_secret: String,
    /// `None` in lite mode.
    pub db: Option<Database>,
}

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let state = Arc::new(state);

    let api_routes = Router::new()
        .merge(routes::calls::router(state.clone()))
        .merge(routes::health::router());

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tether_calls::{CallLogStore, CallerDirectory, SignedTokenIssuer};
    use tether_gateway::Hub;

    pub const SECRET: &str = "test-secret";

    pub fn state() -> AppState {
        let hub = Hub::spawn();
        let calls = CallSignaling::new(
            hub.clone(),
            CallLogStore::memory(),
            CallerDirectory::memory(),
            Arc::new(SignedTokenIssuer::new("app-1", "cert", 3600)),
        );
        AppState {
            calls,
            hub,
            jwt_secret: SECRET.to_string(),
            db: None,
        }
    }
}
