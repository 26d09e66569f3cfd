//! Main application orchestration.
//!
//! Coordinates the capture pipeline:
//! - WebSocket connection and subscriptions
//! - raw-message capture log
//! - tick decoding and reconciliation
//! - idempotent snapshot persistence
//! - session lifecycle (wait for open, stop at close)

use crate::config::AppConfig;
use crate::error::AppResult;
use chrono::Local;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tickcap_core::{resolve_timestamp, SessionWindow, TIMESTAMP_MS};
use tickcap_feed::{decode_tick, SymbolDirectory, TickOutcome, TickReconciler};
use tickcap_store::QuoteStore;
use tickcap_telemetry::CaptureLog;
use tickcap_ws::ConnectionManager;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Poll interval while waiting for the session to open.
const SESSION_WAIT_POLL: Duration = Duration::from_secs(10);

/// Channel capacity for raw frames between transport and pipeline.
const FRAME_CHANNEL_CAPACITY: usize = 1024;

/// Main application.
pub struct Application {
    config: AppConfig,
    window: SessionWindow,
    store: QuoteStore,
    reconciler: TickReconciler,
    directory: SymbolDirectory,
    capture_log: CaptureLog,
}

impl Application {
    /// Create a new application: open storage, rehydrate per-symbol state
    /// from today's already-persisted rows, open the capture log.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let window = config.session_window()?;

        let db_path = Path::new(&config.db_path);
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = QuoteStore::open(db_path)?;

        let mut reconciler = TickReconciler::new(window);
        let persisted = store.latest_per_symbol()?;
        if !persisted.is_empty() {
            info!(
                symbols = persisted.len(),
                table = store.table_name(),
                "Rehydrating aggregates from persisted rows"
            );
            reconciler.rehydrate(persisted.iter());
        }

        let directory = SymbolDirectory::new(config.symbol_pairs());
        let capture_log = CaptureLog::open(Path::new(&config.capture_log_path))?;

        info!(
            instruments = directory.len(),
            table = store.table_name(),
            "Application initialized"
        );

        Ok(Self {
            config,
            window,
            store,
            reconciler,
            directory,
            capture_log,
        })
    }

    /// Block until the local wall clock reaches the session start time.
    ///
    /// Returns false if interrupted by Ctrl-C before the session opened.
    pub async fn wait_for_session_open(&self) -> AppResult<bool> {
        loop {
            let now = Local::now().time();
            if now >= self.window.start {
                return Ok(true);
            }

            info!(
                start = %self.window.start,
                current = %now.format("%H:%M:%S"),
                "Waiting for session start"
            );

            tokio::select! {
                () = tokio::time::sleep(SESSION_WAIT_POLL) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted while waiting for session start");
                    return Ok(false);
                }
            }
        }
    }

    /// Run the capture loop until the session closes, the transport gives
    /// up, or Ctrl-C.
    pub async fn run(&mut self) -> AppResult<()> {
        let (frame_tx, mut frame_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let manager = Arc::new(ConnectionManager::new(
            self.config.connection_config(),
            frame_tx,
        ));

        let ws_handle = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.connect().await })
        };

        loop {
            tokio::select! {
                frame = frame_rx.recv() => {
                    match frame {
                        Some(text) => {
                            if self.handle_frame(&text) {
                                info!("Session window closed, stopping capture");
                                manager.shutdown();
                                break;
                            }
                        }
                        None => {
                            warn!("Transport channel closed, stopping capture");
                            break;
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received, shutting down");
                    manager.shutdown();
                    break;
                }
            }
        }

        // Drain is not needed: state past the terminal update is discarded
        // anyway. Just wait for the transport task to finish.
        drop(frame_rx);
        match ws_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(?e, "Transport exited with error"),
            Err(e) => warn!(?e, "Transport task join error"),
        }

        self.capture_log.flush()?;

        let rows = self.store.row_count().unwrap_or(-1);
        info!(
            rows,
            captured = self.capture_log.lines_written(),
            table = self.store.table_name(),
            "Capture finished"
        );

        Ok(())
    }

    /// Process one raw frame. Returns true when the session is over and
    /// the stream should stop.
    ///
    /// Per-frame failures (bad payload, storage error) are logged and
    /// swallowed so a single poisoned message cannot kill the capture.
    fn handle_frame(&mut self, text: &str) -> bool {
        let update = match decode_tick(text) {
            Ok(Some(update)) => update,
            Ok(None) => {
                // Non-tick frame (heartbeats, subscription acks): audit it
                // with the wall clock and move on.
                if let Err(e) = self.capture_log.record(&resolve_timestamp(None), text) {
                    warn!(?e, "Capture log write failed");
                }
                return false;
            }
            Err(e) => {
                warn!(?e, "Failed to decode frame");
                return false;
            }
        };

        let dt = resolve_timestamp(update.fields.get(TIMESTAMP_MS));
        if let Err(e) = self.capture_log.record(&dt, text) {
            warn!(?e, "Capture log write failed");
        }

        let symbol = self.directory.resolve(&update.conid);
        debug!(conid = %update.conid, symbol = %symbol, dt = %dt, "Tick received");

        match self.reconciler.reconcile(&symbol, &update.fields, &dt) {
            TickOutcome::InSession(row) => {
                if let Err(e) = self.store.upsert(&row) {
                    error!(?e, symbol = %row.symbol, dt = %row.dt, "Upsert failed");
                }
                false
            }
            TickOutcome::SessionEnd(row) => {
                // The closing row carries the session close price; persist
                // it before signaling shutdown.
                if let Err(e) = self.store.upsert(&row) {
                    error!(?e, symbol = %row.symbol, dt = %row.dt, "Final upsert failed");
                }
                info!(symbol = %row.symbol, close = %row.close, "Session end reached");
                true
            }
            TickOutcome::BeforeOpen => {
                info!("Update outside session window, stopping");
                true
            }
        }
    }
}
