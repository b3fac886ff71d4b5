//! Ember bridge server.

use clap::Parser;
use std::net::SocketAddr;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use ember::{auth::AuthConfig, config::Config, create_app_with_state_and_auth, state::AppState};

/// Ember - MCP bridge for the AI assistant sidecar
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Bearer token required on the MCP endpoint
    #[arg(long, env = "EMBER_AUTH_TOKEN", hide_env_values = true)]
    auth_token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration (CLI args > env vars > config files > defaults)
    let config = Config::from_figment(args.port, args.auth_token)?;

    // Initialize logging - config override, then RUST_LOG, then "info"
    let filter = config
        .log_level
        .clone()
        .map(EnvFilter::new)
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("Configuration loaded");

    // The engine is installed by the embedding sidecar; standalone runs
    // answer tool calls with a tool-level unavailable outcome.
    let state = AppState::new();
    warn!("No assistant engine attached; tools/call will report Ember as unavailable");

    let auth_config = AuthConfig::new(config.auth_token.clone());
    let app = create_app_with_state_and_auth(state, auth_config).await;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Ember bridge listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Received Ctrl+C, shutting down gracefully...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    Ok(())
}
