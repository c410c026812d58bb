//! Health check endpoint for load balancers and container orchestrators.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    /// `ok`, `unreachable`, or `disabled` in lite mode.
    database: &'static str,
    connections: usize,
    rooms: usize,
    online_users: usize,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let database = match &state.db {
        Some(db) => {
            if tether_db::postgres::health_check(&db.pg).await {
                "ok"
            } else {
                "unreachable"
            }
        }
        None => "disabled",
    };

    let (hub_ok, stats) = match state.hub.stats().await {
        Ok(stats) => (true, stats),
        Err(e) => {
            tracing::error!(error = %e, "Hub is not answering");
            (false, Default::default())
        }
    };

    let healthy = hub_ok && database != "unreachable";
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            database,
            connections: stats.connections,
            rooms: stats.rooms,
            online_users: stats.online_users,
        }),
    )
}

#[cfg(test)]
mod tests {
    use crate::build_router;
    use crate::test_support::state;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    #[tokio::test]
    async fn lite_mode_is_healthy_without_a_token() {
        let app = build_router(state());
        let resp = app
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value =
            serde_json::from_slice(&to_bytes(resp.into_body(), usize::MAX).await.unwrap()).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "disabled");
        assert_eq!(body["connections"], 0);
    }
}
