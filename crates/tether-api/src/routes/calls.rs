//! Call signaling routes.
//!
//! Routes:
//! - POST /calls/initiate: ring another user
//! - POST /calls/{call_id}/answer: callee picks up
//! - POST /calls/{call_id}/reject: callee declines
//! - POST /calls/{call_id}/end: either side hangs up

use axum::{
    Json, Router,
    extract::{Extension, Path, State},
    middleware,
    routing::post,
};
use serde::Deserialize;
use std::sync::Arc;
use tether_calls::{CallOutcome, CallTicket};
use tether_common::{auth::AuthContext, error::TetherResult, validation::validate_request};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;

/// Call routes. All require authentication.
pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/calls/initiate", post(initiate_call))
        .route("/calls/{call_id}/answer", post(answer_call))
        .route("/calls/{call_id}/reject", post(reject_call))
        .route("/calls/{call_id}/end", post(end_call))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth_middleware,
        ))
}

#[derive(Debug, Deserialize, Validate)]
pub struct InitiateCallRequest {
    pub receiver_id: Uuid,
    #[validate(length(min = 1, message = "call_type is required"))]
    pub call_type: String,
}

/// POST /calls/initiate
async fn initiate_call(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<InitiateCallRequest>,
) -> TetherResult<Json<CallTicket>> {
    validate_request(&body)?;
    let ticket = state
        .calls
        .initiate(auth.user_id, body.receiver_id, &body.call_type)
        .await?;
    Ok(Json(ticket))
}

/// POST /calls/{call_id}/answer
async fn answer_call(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(call_id): Path<Uuid>,
) -> TetherResult<Json<CallTicket>> {
    Ok(Json(state.calls.answer(call_id, auth.user_id).await?))
}

/// POST /calls/{call_id}/reject
async fn reject_call(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(call_id): Path<Uuid>,
) -> TetherResult<Json<CallOutcome>> {
    Ok(Json(state.calls.reject(call_id, auth.user_id).await?))
}

/// POST /calls/{call_id}/end
async fn end_call(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(call_id): Path<Uuid>,
) -> TetherResult<Json<CallOutcome>> {
    Ok(Json(state.calls.end(call_id, auth.user_id).await?))
}

#[cfg(test)]
mod tests {
    use crate::build_router;
    use crate::test_support::{SECRET, state};
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use tether_common::auth::create_access_token;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn bearer(user: Uuid) -> String {
        format!(
            "Bearer {}",
            create_access_token(user, "client", SECRET, 300).unwrap()
        )
    }

    async fn post(app: &Router, uri: &str, user: Option<Uuid>, body: Value) -> (StatusCode, Value) {
        let mut req = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(user) = user {
            req = req.header(header::AUTHORIZATION, bearer(user));
        }
        let resp = app
            .clone()
            .oneshot(req.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    #[tokio::test]
    async fn full_call_over_http() {
        let app = build_router(state());
        let (caller, callee) = (Uuid::new_v4(), Uuid::new_v4());

        let (status, ticket) = post(
            &app,
            "/api/v1/calls/initiate",
            Some(caller),
            json!({"receiver_id": callee, "call_type": "audio"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ticket["uid"], 1);
        assert_eq!(ticket["app_id"], "app-1");
        let call_id = ticket["call_id"].as_str().unwrap().to_string();

        let (status, answer) = post(
            &app,
            &format!("/api/v1/calls/{call_id}/answer"),
            Some(callee),
            json!({}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(answer["uid"], 2);
        assert_eq!(answer["channel_name"], ticket["channel_name"]);

        let (status, outcome) = post(
            &app,
            &format!("/api/v1/calls/{call_id}/end"),
            Some(caller),
            json!({}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["status"], "ended");
        assert_eq!(outcome["uid"], 1);
        assert_eq!(outcome["call_id"], ticket["call_id"]);
        assert_eq!(outcome["channel_name"], ticket["channel_name"]);

        let (status, err) = post(
            &app,
            &format!("/api/v1/calls/{call_id}/reject"),
            Some(callee),
            json!({}),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["error"], "INVALID_STATE");
    }

    #[tokio::test]
    async fn calls_require_a_token() {
        let app = build_router(state());
        let (status, _) = post(
            &app,
            "/api/v1/calls/initiate",
            None,
            json!({"receiver_id": Uuid::new_v4(), "call_type": "audio"}),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn token_may_come_from_the_query_string() {
        let app = build_router(state());
        let token = create_access_token(Uuid::new_v4(), "client", SECRET, 300).unwrap();
        let (status, _) = post(
            &app,
            &format!("/api/v1/calls/initiate?token={token}"),
            None,
            json!({"receiver_id": Uuid::new_v4(), "call_type": "video"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn bad_call_type_is_a_validation_error() {
        let app = build_router(state());
        let (status, err) = post(
            &app,
            "/api/v1/calls/initiate",
            Some(Uuid::new_v4()),
            json!({"receiver_id": Uuid::new_v4(), "call_type": "fax"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn strangers_cannot_see_calls() {
        let app = build_router(state());
        let (status, ticket) = post(
            &app,
            "/api/v1/calls/initiate",
            Some(Uuid::new_v4()),
            json!({"receiver_id": Uuid::new_v4(), "call_type": "audio"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = post(
            &app,
            &format!("/api/v1/calls/{}/end", ticket["call_id"].as_str().unwrap()),
            Some(Uuid::new_v4()),
            json!({}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
