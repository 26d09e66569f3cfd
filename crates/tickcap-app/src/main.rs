//! Tick capture daemon - entry point.
//!
//! Connects to a broker WebSocket gateway, captures per-symbol quote
//! snapshots for one trading session, and persists them idempotently to a
//! daily SQLite table.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Market data tick capture daemon
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via TICKCAP_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    tickcap_ws::init_crypto();

    let args = Args::parse();

    // Determine config path: CLI arg > TICKCAP_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("TICKCAP_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    let config = if std::path::Path::new(&config_path).exists() {
        tickcap_app::AppConfig::from_file(&config_path)?
    } else {
        tickcap_app::AppConfig::default()
    };

    tickcap_telemetry::init_logging(&config.log_level)?;

    info!("Starting tickcap v{}", env!("CARGO_PKG_VERSION"));
    info!(config_path = %config_path, ws_url = %config.ws_url, "Configuration loaded");

    let mut app = tickcap_app::Application::new(config)?;

    // The stream is only worth opening once the session window starts.
    if !app.wait_for_session_open().await? {
        return Ok(());
    }

    app.run().await?;

    Ok(())
}
