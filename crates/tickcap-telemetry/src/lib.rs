//! Structured logging and raw-message capture log for tickcap.

pub mod capture_log;
pub mod error;
pub mod logging;

pub use capture_log::CaptureLog;
pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
