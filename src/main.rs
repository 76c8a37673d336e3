//! IPTV Proxy
//!
//! Serves live TV channels behind a stable local endpoint. Channel HLS
//! playlists are fetched from their upstream CDN and rewritten so that
//! every nested playlist, key and segment is requested through this proxy
//! as well.

mod channels;
mod cli;
mod config;
mod config_file;
mod error;
mod http;
mod registry;
mod state;


use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command, ServeArgs, ShowArgs};
use crate::config::ServerConfig;
use crate::config_file::load_server_config;
use crate::error::{Result, ServerError};
use crate::http::create_router;
use crate::registry::ChannelRegistry;
use crate::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "iptv-proxy";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Show(args) => show(args),
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let mut config = load_server_config(&args.common.config);
    args.apply(&mut config);

    // Initialize logging
    init_logging(&config);

    tracing::info!("{} v{} starting", APP_NAME, VERSION);
    tracing::info!("Configuration loaded: {:?}", config);

    let registry = Arc::new(ChannelRegistry::new());
    channels::populate(&registry, &config.channels)?;
    tracing::info!("{} channel(s) registered", registry.len());

    if let Some(path) = config.channels.links_file.clone() {
        if config.channels.refresh_secs > 0 {
            channels::spawn_refresher(
                Arc::clone(&registry),
                path,
                Duration::from_secs(config.channels.refresh_secs),
            );
        }
    }

    // Create application state
    let state = Arc::new(AppState::new(config.clone(), registry)?);

    // Build router
    let app = create_router(state);

    // Start server
    let addr: SocketAddr = config
        .socket_addr()
        .parse()
        .map_err(|e| ServerError::Config(format!("invalid listen address: {}", e)))?;
    tracing::info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn show(args: ShowArgs) -> Result<()> {
    let mut config = load_server_config(&args.common.config);
    args.common.apply(&mut config);

    let registry = ChannelRegistry::new();
    channels::populate(&registry, &config.channels)?;

    print!(
        "{}",
        channels::render_playlist(&registry.snapshot(), args.base_url.as_deref())
    );
    Ok(())
}

/// Initialize logging with tracing
///
/// `RUST_LOG` wins over the configured level.
fn init_logging(config: &ServerConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("iptv_proxy={0},tower_http={0}", config.log_level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
