//! Chat Hub Server - Entry Point
//!
//! Starts the TCP listener and ChatServer actor, accepting connections.

use std::process::ExitCode;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_hub::{serve, Hub, HubHandle, ServerConfig};

/// Channel buffer size for server commands
const CHANNEL_BUFFER_SIZE: usize = 256;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_hub=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_hub=info")),
        )
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // Start TCP listener
    let listener = match TcpListener::bind(config.bind).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", config.bind, e);
            return ExitCode::FAILURE;
        }
    };
    info!("Chat hub listening on {}", config.bind);

    // Start ChatServer actor
    let hub = HubHandle::spawn(Hub::with_join_history(config.join_history), CHANNEL_BUFFER_SIZE);
    info!("ChatServer actor started");

    serve(listener, hub).await;
    ExitCode::SUCCESS
}
