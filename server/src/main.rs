//! `VoiceChat` Authorization Service - Main Entry Point
//!
//! Channel membership and file access decisions over HTTP.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use vc_authz::api;
use vc_authz::channels::Channel;
use vc_authz::config::Config;
use vc_authz::files::File;
use vc_authz::membership::{HttpMembershipQuery, LedgerMembershipQuery, MembershipQuery};
use vc_authz::store::{self, ChannelStore, FileStore, MemoryStore, PgStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vc_authz=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting VoiceChat Authorization Service"
    );

    let (channel_store, file_store): (Arc<ChannelStore>, Arc<FileStore>) =
        match config.database_url.as_deref() {
            Some(database_url) => {
                let pool = store::postgres::create_pool(database_url).await?;
                store::postgres::run_migrations(&pool).await?;
                let pg = Arc::new(PgStore::new(pool));
                let channels: Arc<ChannelStore> = pg.clone();
                let files: Arc<FileStore> = pg;
                (channels, files)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory storage");
                let channels: Arc<ChannelStore> = Arc::new(MemoryStore::<Channel>::new());
                let files: Arc<FileStore> = Arc::new(MemoryStore::<File>::new());
                (channels, files)
            }
        };

    let membership = membership_query(&config, &channel_store)?;
    let state = api::AppState::new(config.clone(), channel_store, file_store, membership);

    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shutdown complete");

    Ok(())
}

/// Remote membership service if configured, otherwise the local channel store.
fn membership_query(
    config: &Config,
    channel_store: &Arc<ChannelStore>,
) -> Result<Arc<dyn MembershipQuery>> {
    match &config.membership_service_url {
        Some(url) => {
            let query = HttpMembershipQuery::new(url.as_str(), config.membership_query_timeout)
                .context("Failed to build membership service client")?
                .with_service_token(config.internal_service_token.clone());
            info!(url = %url, "Using remote membership service");
            Ok(Arc::new(query))
        }
        None => {
            info!("Answering membership from the local channel store");
            Ok(Arc::new(LedgerMembershipQuery::new(Arc::clone(channel_store))))
        }
    }
}
