//! Application configuration loaded from environment variables and config files.
//!
//! Supports `.env` files for development and environment variables for production.
//! Config precedence: env vars > .env file > config file > defaults
//!
//! The loaded [`AppConfig`] is handed to each service at startup; nothing reads
//! it through a global.

use serde::Deserialize;
use std::time::Duration;

/// Load configuration, reading the optional config file named `path`
/// (extension inferred, e.g. `config` → `config.toml`).
pub fn load(path: &str) -> Result<AppConfig, config::ConfigError> {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();

    let cfg = config::Config::builder()
        // Defaults
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("server.gateway_port", 8081)?
        .set_default("database.url", "")?
        .set_default("database.max_connections", 20)?
        .set_default("database.min_connections", 1)?
        .set_default("gateway.send_queue_capacity", 256)?
        .set_default("gateway.write_wait_secs", 10)?
        .set_default("gateway.pong_wait_secs", 60)?
        .set_default("gateway.ping_period_secs", 30)?
        .set_default("media.app_id", "")?
        .set_default("media.app_certificate", "")?
        .set_default("media.token_ttl_secs", 3600)?
        // Optional config file
        .add_source(config::File::with_name(path).required(false))
        // Environment variables (TETHER__SERVER__PORT, TETHER__AUTH__JWT_SECRET, etc.)
        .add_source(
            config::Environment::with_prefix("TETHER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app_config: AppConfig = cfg.try_deserialize()?;
    app_config.gateway.validate()?;
    Ok(app_config)
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub gateway: GatewayConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    /// REST API port.
    pub port: u16,
    /// WebSocket gateway port.
    pub gateway_port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL. Empty runs the call log in memory (lite mode).
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

impl DatabaseConfig {
    pub fn is_lite(&self) -> bool {
        self.url.trim().is_empty()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// JWT signing secret (HS256)
    pub jwt_secret: String,
}

/// Per-connection transport tuning.
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    /// Outbound frames buffered per connection before it is treated as stalled.
    pub send_queue_capacity: usize,
    /// Time allowed to write one frame to the peer.
    pub write_wait_secs: u64,
    /// Time allowed between inbound frames before the peer is considered gone.
    pub pong_wait_secs: u64,
    /// Keepalive ping period. Must be less than `pong_wait_secs`.
    pub ping_period_secs: u64,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.send_queue_capacity == 0 {
            return Err(config::ConfigError::Message(
                "gateway.send_queue_capacity must be at least 1".into(),
            ));
        }
        if self.ping_period_secs == 0 || self.ping_period_secs >= self.pong_wait_secs {
            return Err(config::ConfigError::Message(format!(
                "gateway.ping_period_secs ({}) must be non-zero and below gateway.pong_wait_secs ({})",
                self.ping_period_secs, self.pong_wait_secs
            )));
        }
        Ok(())
    }

    pub fn write_wait(&self) -> Duration {
        Duration::from_secs(self.write_wait_secs)
    }

    pub fn pong_wait(&self) -> Duration {
        Duration::from_secs(self.pong_wait_secs)
    }

    pub fn ping_period(&self) -> Duration {
        Duration::from_secs(self.ping_period_secs)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            send_queue_capacity: 256,
            write_wait_secs: 10,
            pong_wait_secs: 60,
            ping_period_secs: 30,
        }
    }
}

/// Media relay credentials (app id + certificate issued by the relay vendor).
#[derive(Debug, Deserialize, Clone)]
pub struct MediaConfig {
    pub app_id: String,
    pub app_certificate: String,
    pub token_ttl_secs: u64,
}
