//! Tick capture application crate.
//!
//! Wires the transport, feed, and storage layers together and owns the
//! session lifecycle: wait for the session window, capture until close,
//! persist the final rows, shut down.

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
