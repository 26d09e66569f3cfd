//! WebSocket connection manager.
//!
//! Handles connection lifecycle, automatic reconnection with exponential
//! backoff, and subscription restoration after reconnection. Text frames
//! are forwarded untouched; decoding belongs to the feed layer.

use crate::error::{WsError, WsResult};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL.
    pub url: String,
    /// Contract identifiers to subscribe to.
    pub conids: Vec<String>,
    /// Field codes requested per update.
    pub fields: Vec<String>,
    /// Maximum reconnection attempts (0 = infinite).
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential backoff.
    pub reconnect_base_delay_ms: u64,
    /// Maximum delay for exponential backoff.
    pub reconnect_max_delay_ms: u64,
    /// Settle delay after connect before subscriptions are sent.
    pub subscribe_delay_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            conids: Vec::new(),
            fields: Vec::new(),
            max_reconnect_attempts: 0, // Infinite
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 60000,
            subscribe_delay_ms: 2000,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Build one market-data subscription request.
///
/// Wire format: `smd+<conid>+{"fields":[...]}`.
pub fn subscription_request(conid: &str, fields: &[String]) -> String {
    format!("smd+{}+{}", conid, serde_json::json!({ "fields": fields }))
}

/// WebSocket connection manager.
pub struct ConnectionManager {
    config: ConnectionConfig,
    state: Arc<RwLock<ConnectionState>>,
    message_tx: mpsc::Sender<String>,
    shutdown_token: CancellationToken,
}

impl ConnectionManager {
    /// Create a new connection manager. Text frames are forwarded to
    /// `message_tx` as received.
    pub fn new(config: ConnectionConfig, message_tx: mpsc::Sender<String>) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            message_tx,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Signal graceful shutdown: the message loop sends a Close frame and
    /// the reconnect loop stops retrying.
    pub fn shutdown(&self) {
        info!("ConnectionManager shutdown requested");
        self.shutdown_token.cancel();
    }

    /// Check if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Connect to the WebSocket and run the message loop until shutdown or
    /// the reconnect budget is exhausted.
    pub async fn connect(&self) -> WsResult<()> {
        self.connect_with_retry().await
    }

    async fn connect_with_retry(&self) -> WsResult<()> {
        let mut attempt = 0u32;

        loop {
            if self.is_shutdown() {
                info!("Shutdown requested, exiting connect loop");
                *self.state.write() = ConnectionState::Disconnected;
                return Ok(());
            }

            *self.state.write() = ConnectionState::Connecting;

            match self.try_connect().await {
                Ok(()) => {
                    info!("WebSocket connection closed");
                }
                Err(e) => {
                    error!(?e, "WebSocket connection error");
                }
            }

            if self.is_shutdown() {
                info!("Shutdown requested after disconnect, not reconnecting");
                *self.state.write() = ConnectionState::Disconnected;
                return Ok(());
            }

            attempt += 1;
            if self.config.max_reconnect_attempts > 0
                && attempt >= self.config.max_reconnect_attempts
            {
                error!(attempt, "Max reconnection attempts reached");
                return Err(WsError::ConnectionFailed(
                    "Max reconnection attempts reached".to_string(),
                ));
            }

            *self.state.write() = ConnectionState::Reconnecting;

            let delay = self.calculate_backoff_delay(attempt);
            warn!(attempt, delay_ms = delay.as_millis(), "Reconnecting");

            // Cancellation-aware backoff sleep.
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown requested during backoff, exiting");
                    *self.state.write() = ConnectionState::Disconnected;
                    return Ok(());
                }
            }
        }
    }

    async fn try_connect(&self) -> WsResult<()> {
        info!(url = %self.config.url, "Connecting to WebSocket");

        let (ws_stream, _response) =
            connect_async_tls_with_config(&self.config.url, None, true, None).await?;
        let (mut write, mut read) = ws_stream.split();

        *self.state.write() = ConnectionState::Connected;
        info!("WebSocket connected");

        // Let the session settle before subscribing, then request market
        // data for every configured instrument.
        tokio::time::sleep(Duration::from_millis(self.config.subscribe_delay_ms)).await;
        for conid in &self.config.conids {
            let request = subscription_request(conid, &self.config.fields);
            write.send(Message::Text(request)).await?;
            debug!(conid = %conid, "Subscription sent");
        }
        info!(count = self.config.conids.len(), "All subscriptions sent");

        loop {
            tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received in message loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(?e, "Failed to send Close frame during shutdown");
                    }
                    *self.state.write() = ConnectionState::Disconnected;
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if self.message_tx.send(text).await.is_err() {
                                warn!("Message receiver dropped, closing connection");
                                *self.state.write() = ConnectionState::Disconnected;
                                return Ok(());
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            debug!("Received ping, sending pong");
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "WebSocket closed by server");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => {
                            error!(?e, "WebSocket read error");
                            return Err(e.into());
                        }
                        None => {
                            warn!("WebSocket stream ended");
                            return Ok(());
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.reconnect_base_delay_ms;
        let max = self.config.reconnect_max_delay_ms;

        // Exponential backoff: base * 2^(attempt-1), capped.
        let exponent = attempt.saturating_sub(1).min(10);
        let delay = base.saturating_mul(1u64 << exponent);
        let delay = delay.min(max);

        let jitter = rand_jitter();
        Duration::from_millis(delay + jitter)
    }
}

/// Generate random jitter (0-1000ms).
fn rand_jitter() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1000) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.max_reconnect_attempts, 0); // Infinite
        assert_eq!(config.reconnect_base_delay_ms, 1000);
    }

    #[test]
    fn test_subscription_request_format() {
        let fields = vec!["31".to_string(), "84".to_string(), "86".to_string()];
        let req = subscription_request("756733", &fields);
        assert_eq!(req, r#"smd+756733+{"fields":["31","84","86"]}"#);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = ConnectionConfig {
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 8000,
            ..Default::default()
        };
        let (tx, _rx) = mpsc::channel(1);
        let manager = ConnectionManager::new(config, tx);

        let d1 = manager.calculate_backoff_delay(1).as_millis() as u64;
        let d3 = manager.calculate_backoff_delay(3).as_millis() as u64;
        let d10 = manager.calculate_backoff_delay(10).as_millis() as u64;

        // Jitter adds up to 1000ms on top of the deterministic part.
        assert!((1000..2000).contains(&d1));
        assert!((4000..5000).contains(&d3));
        assert!((8000..9000).contains(&d10));
    }

    #[tokio::test]
    async fn test_shutdown_before_connect_exits_cleanly() {
        let (tx, _rx) = mpsc::channel(1);
        let manager = ConnectionManager::new(ConnectionConfig::default(), tx);

        manager.shutdown();
        assert!(manager.is_shutdown());
        assert!(manager.connect().await.is_ok());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }
}
