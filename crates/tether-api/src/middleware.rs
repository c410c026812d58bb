//! Middleware: authentication extraction.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tether_common::{auth, error::TetherError};

use crate::AppState;

/// Resolve the caller from `Authorization: Bearer <token>` (or `?token=`)
/// and insert an [`auth::AuthContext`] for handlers to extract.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, TetherError> {
    let token = auth::request_token(request.headers(), request.uri())
        .ok_or(TetherError::Unauthorized)?;

    let identity = auth::authenticate(&token, &state.jwt_secret)?;
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}
