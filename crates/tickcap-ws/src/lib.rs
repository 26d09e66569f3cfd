//! WebSocket transport for the tickcap market-data stream.
//!
//! Provides:
//! - automatic reconnection with exponential backoff and jitter
//! - market-data subscription requests after each (re)connect
//! - cooperative shutdown via cancellation token
//! - raw text frames forwarded over a channel to the pipeline driver

pub mod connection;
pub mod error;

pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState};
pub use error::{WsError, WsResult};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
