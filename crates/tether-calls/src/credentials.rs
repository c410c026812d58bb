//! Media relay credentials.
//!
//! A credential authorizes one uid to publish into one relay channel until it
//! expires. The relay vendor is behind [`MediaCredentialIssuer`];
//! [`SignedTokenIssuer`] is the HMAC-signed implementation used by default.
//!
//! Token layout: `v1.<base64url(app_id|channel|uid|expires_at)>.<hex(hmac_sha256)>`

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tether_common::config::MediaConfig;

type HmacSha256 = Hmac<Sha256>;

/// Relay uid for the party that placed the call.
pub const CALLER_UID: u32 = 1;
/// Relay uid for the party that answered.
pub const CALLEE_UID: u32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("media relay app id and certificate are required")]
    NotConfigured,
    #[error("failed to sign media credential: {0}")]
    Signing(String),
}

/// Issues relay credentials.
pub trait MediaCredentialIssuer: Send + Sync {
    /// Application id clients present to the relay alongside the token.
    fn app_id(&self) -> &str;

    /// Credential for `uid` to join `channel`.
    fn issue(&self, channel: &str, uid: u32) -> Result<String, CredentialError>;
}

/// Claims recovered from a verified token.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCredential {
    pub channel: String,
    pub uid: u32,
    pub expires_at: i64,
}

pub struct SignedTokenIssuer {
    app_id: String,
    certificate: String,
    ttl_secs: u64,
}

impl SignedTokenIssuer {
    pub fn new(app_id: impl Into<String>, certificate: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            app_id: app_id.into(),
            certificate: certificate.into(),
            ttl_secs,
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(
            config.app_id.clone(),
            config.app_certificate.clone(),
            config.token_ttl_secs,
        )
    }

    fn mac(&self) -> Result<HmacSha256, CredentialError> {
        HmacSha256::new_from_slice(self.certificate.as_bytes())
            .map_err(|e| CredentialError::Signing(e.to_string()))
    }

    /// Check signature and expiry. Returns `None` for anything not issued by
    /// this issuer or already expired.
    #[cfg(test)]
    fn verify(&self, token: &str) -> Option<VerifiedCredential> {
        let rest = token.strip_prefix("v1.")?;
        let (encoded, signature) = rest.split_once('.')?;
        let payload = URL_SAFE_NO_PAD.decode(encoded).ok()?;

        let mut mac = self.mac().ok()?;
        mac.update(&payload);
        mac.verify_slice(&hex::decode(signature).ok()?).ok()?;

        let payload = String::from_utf8(payload).ok()?;
        let mut parts = payload.split('|');
        let (app_id, channel, uid, expires_at) =
            (parts.next()?, parts.next()?, parts.next()?, parts.next()?);
        if app_id != self.app_id || parts.next().is_some() {
            return None;
        }

        let expires_at: i64 = expires_at.parse().ok()?;
        if expires_at < Utc::now().timestamp() {
            return None;
        }

        Some(VerifiedCredential {
            channel: channel.to_string(),
            uid: uid.parse().ok()?,
            expires_at,
        })
    }
}

impl MediaCredentialIssuer for SignedTokenIssuer {
    fn app_id(&self) -> &str {
        &self.app_id
    }

    fn issue(&self, channel: &str, uid: u32) -> Result<String, CredentialError> {
        if self.app_id.is_empty() || self.certificate.is_empty() {
            return Err(CredentialError::NotConfigured);
        }

        let expires_at = Utc::now().timestamp() + self.ttl_secs as i64;
        let payload = format!("{}|{channel}|{uid}|{expires_at}", self.app_id);

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(format!("v1.{}.{signature}", URL_SAFE_NO_PAD.encode(payload)))
    }
}
