//! Application configuration.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tickcap_core::SessionWindow;
use tickcap_ws::ConnectionConfig;

/// One captured instrument: a broker contract id mapped to the symbol it
/// is stored under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Broker contract identifier.
    pub conid: String,
    /// Storage symbol (e.g. "SPY").
    pub symbol: String,
}

/// Trading session window, local wall-clock times as "%H:%M:%S".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_start")]
    pub start: String,
    #[serde(default = "default_session_end")]
    pub end: String,
}

fn default_session_start() -> String {
    "09:29:00".to_string()
}

fn default_session_end() -> String {
    "16:01:00".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            start: default_session_start(),
            end: default_session_end(),
        }
    }
}

/// WebSocket transport tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketConfig {
    /// Maximum reconnection attempts (0 = infinite).
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential backoff (ms). Default: 1000.
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    /// Maximum backoff delay (ms). Default: 60000.
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    /// Settle delay after connect before subscribing (ms). Default: 2000.
    #[serde(default = "default_subscribe_delay_ms")]
    pub subscribe_delay_ms: u64,
}

fn default_reconnect_base_delay_ms() -> u64 {
    1000
}

fn default_reconnect_max_delay_ms() -> u64 {
    60_000
}

fn default_subscribe_delay_ms() -> u64 {
    2000
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 0,
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            subscribe_delay_ms: default_subscribe_delay_ms(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Market data WebSocket endpoint.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// SQLite database path.
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Raw-message capture log path.
    #[serde(default = "default_capture_log_path")]
    pub capture_log_path: String,
    /// Default log level when RUST_LOG is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Field codes requested per subscription.
    #[serde(default = "default_fields")]
    pub fields: Vec<String>,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    /// Instruments to subscribe to.
    #[serde(default)]
    pub instruments: Vec<InstrumentConfig>,
}

fn default_ws_url() -> String {
    "wss://localhost:5000/v1/api/ws".to_string()
}

fn default_db_path() -> String {
    "data/quotes.db".to_string()
}

fn default_capture_log_path() -> String {
    "capture.log".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_fields() -> Vec<String> {
    // 31=last, 83=timestamp, 85=bid size, 84=bid, 86=ask, 88=ask size,
    // 89=volume, 293=market data availability.
    ["31", "83", "85", "84", "86", "88", "89", "293"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            db_path: default_db_path(),
            capture_log_path: default_capture_log_path(),
            log_level: default_log_level(),
            fields: default_fields(),
            session: SessionConfig::default(),
            websocket: WebSocketConfig::default(),
            instruments: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration: TICKCAP_CONFIG env var or the default path,
    /// falling back to defaults when the file does not exist.
    pub fn load() -> AppResult<Self> {
        let config_path =
            std::env::var("TICKCAP_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());

        if Path::new(&config_path).exists() {
            Self::from_file(&config_path)
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Parse the configured session window.
    pub fn session_window(&self) -> AppResult<SessionWindow> {
        Ok(SessionWindow::from_strs(
            &self.session.start,
            &self.session.end,
        )?)
    }

    /// Build the transport configuration from the instrument list.
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            url: self.ws_url.clone(),
            conids: self.instruments.iter().map(|i| i.conid.clone()).collect(),
            fields: self.fields.clone(),
            max_reconnect_attempts: self.websocket.max_reconnect_attempts,
            reconnect_base_delay_ms: self.websocket.reconnect_base_delay_ms,
            reconnect_max_delay_ms: self.websocket.reconnect_max_delay_ms,
            subscribe_delay_ms: self.websocket.subscribe_delay_ms,
        }
    }

    /// (conid, symbol) pairs for the symbol directory.
    pub fn symbol_pairs(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.instruments
            .iter()
            .map(|i| (i.conid.clone(), i.symbol.clone()))
    }
}
