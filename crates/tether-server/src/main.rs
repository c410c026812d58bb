//! # Tether Server
//!
//! Runs both listeners in one process around a single hub:
//! - REST API (call signaling, health)
//! - WebSocket gateway (rooms, presence, live events)
//!
//! With no database URL configured the server starts in lite mode and keeps
//! the call log in memory.

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tether_api::{AppState, build_router};
use tether_calls::{CallLogStore, CallSignaling, CallerDirectory, SignedTokenIssuer};
use tether_db::Database;
use tether_gateway::{GatewayState, Hub};

#[derive(Debug, Parser)]
#[command(name = "tether", version, about = "Real-time hub and call signaling")]
struct Cli {
    /// Config file path, without extension.
    #[arg(long, env = "TETHER_CONFIG", default_value = "config")]
    config: String,

    /// Emit logs as JSON lines.
    #[arg(long, env = "TETHER_JSON_LOGS")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = tether_common::config::load(&cli.config)?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tether=debug,tower_http=debug".into());
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    }

    tracing::info!("Starting Tether v{}", env!("CARGO_PKG_VERSION"));

    anyhow::ensure!(
        !config.auth.jwt_secret.is_empty(),
        "auth.jwt_secret must be set"
    );
    if config.media.app_id.is_empty() || config.media.app_certificate.is_empty() {
        tracing::warn!("Media relay credentials are not configured; calls cannot be placed");
    }

    // === Storage ===
    let db = if config.database.is_lite() {
        tracing::warn!("No database configured, running in lite mode (call log kept in memory)");
        None
    } else {
        let db = Database::connect(&config.database).await?;
        db.migrate().await?;
        Some(db)
    };
    let (store, directory) = match &db {
        Some(db) => (
            CallLogStore::Postgres(db.clone()),
            CallerDirectory::Postgres(db.clone()),
        ),
        None => (CallLogStore::memory(), CallerDirectory::memory()),
    };

    // === Hub ===
    // The one place connections, rooms, and presence live. Both listeners
    // talk to it through cloned handles.
    let hub = Hub::spawn();

    // === REST API Server ===
    let calls = CallSignaling::new(
        hub.clone(),
        store,
        directory,
        Arc::new(SignedTokenIssuer::from_config(&config.media)),
    );
    let api_router = build_router(AppState {
        calls,
        hub: hub.clone(),
        jwt_secret: config.auth.jwt_secret.clone(),
        db,
    });
    let api_addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    // === WebSocket Gateway ===
    let gateway_router = tether_gateway::build_router(GatewayState::new(
        hub,
        config.auth.jwt_secret.clone(),
        config.gateway.clone(),
    ));
    let gateway_addr = SocketAddr::new(config.server.host.parse()?, config.server.gateway_port);

    tracing::info!("REST API listening on http://{api_addr}");
    tracing::info!("Gateway listening on ws://{gateway_addr}");

    tokio::try_join!(
        async {
            let listener = tokio::net::TcpListener::bind(api_addr).await?;
            axum::serve(listener, api_router).await?;
            Ok::<_, anyhow::Error>(())
        },
        async {
            let listener = tokio::net::TcpListener::bind(gateway_addr).await?;
            axum::serve(listener, gateway_router).await?;
            Ok::<_, anyhow::Error>(())
        },
    )?;

    Ok(())
}
