//! Shared JWT authentication utilities.
//!
//! Tokens are issued by the accounts service; both the REST layer and the
//! WebSocket upgrade path only need to validate them and pull out the user.

use axum::extract::Query;
use axum::http::{HeaderMap, Uri, header};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TetherError;

/// JWT claims embedded in access and refresh tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as string)
    pub sub: String,
    /// Account role ("customer", "provider", "admin")
    pub role: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// Token type ("access" or "refresh")
    pub token_type: String,
}

/// The caller's identity once a token has been accepted.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: String,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Token from `Authorization: Bearer`, else the `token` query parameter
/// (browsers can't set headers on a WebSocket upgrade).
pub fn request_token(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
        .or_else(|| {
            Query::<TokenQuery>::try_from_uri(uri)
                .ok()
                .and_then(|Query(q)| q.token)
        })
}

/// Validate and decode a JWT token.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Validate an access token and resolve it to an [`AuthContext`].
pub fn authenticate(token: &str, secret: &str) -> Result<AuthContext, TetherError> {
    let claims = validate_token(token, secret).map_err(|_| TetherError::InvalidToken)?;

    // Refresh tokens can't be used to open sessions
    if claims.token_type != "access" {
        return Err(TetherError::InvalidToken);
    }

    let user_id = claims
        .sub
        .parse::<Uuid>()
        .map_err(|_| TetherError::InvalidToken)?;

    Ok(AuthContext {
        user_id,
        role: claims.role,
    })
}

/// Generate a JWT access token.
pub fn create_access_token(
    user_id: Uuid,
    role: &str,
    secret: &str,
    ttl_secs: u64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ttl_secs as i64)).timestamp(),
        token_type: "access".to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-with-enough-entropy";

    #[test]
    fn access_token_round_trips() {
        let uid = Uuid::new_v4();
        let token = create_access_token(uid, "customer", SECRET, 60).unwrap();
        let ctx = authenticate(&token, SECRET).unwrap();
        assert_eq!(ctx.user_id, uid);
        assert_eq!(ctx.role, "customer");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_access_token(Uuid::new_v4(), "customer", SECRET, 60).unwrap();
        assert!(matches!(
            authenticate(&token, "another-secret"),
            Err(TetherError::InvalidToken)
        ));
    }

    #[test]
    fn refresh_tokens_are_rejected() {
        let now = Utc::now();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            role: "customer".into(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(60)).timestamp(),
            token_type: "refresh".into(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(authenticate(&token, SECRET).is_err());
    }

    #[test]
    fn header_wins_over_query() {
        let mut headers = HeaderMap::new();
        let uri: Uri = "/ws?token=from-query".parse().unwrap();
        assert_eq!(request_token(&headers, &uri).as_deref(), Some("from-query"));

        headers.insert(header::AUTHORIZATION, "Bearer from-header".parse().unwrap());
        assert_eq!(request_token(&headers, &uri).as_deref(), Some("from-header"));

        let bare: Uri = "/ws".parse().unwrap();
        assert_eq!(request_token(&HeaderMap::new(), &bare), None);

        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(request_token(&headers, &bare), None);
    }
}
