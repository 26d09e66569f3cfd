//! Trading-session window gating.
//!
//! The capture pipeline only accepts updates inside a configured local-time
//! window. An update landing at or past the end time (or before the start
//! time) is the terminal signal that stops stream consumption.

use crate::error::{CoreError, Result};
use chrono::NaiveTime;

/// Time-of-day format used in configuration.
const TIME_FORMAT: &str = "%H:%M:%S";

/// Session gate decision for one update's time-of-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionGate {
    /// Inside the window; reconcile and persist normally.
    Open,
    /// At or past the end time; the close price is recorded and the final
    /// row persisted before the stream stops.
    AtClose,
    /// Before the start time; stop without persisting.
    BeforeOpen,
}

impl SessionGate {
    /// Whether this gate decision terminates stream consumption.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

/// Configured trading-session window, local wall-clock, second precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SessionWindow {
    /// Build a window from "HH:MM:SS" strings.
    pub fn from_strs(start: &str, end: &str) -> Result<Self> {
        let start = NaiveTime::parse_from_str(start, TIME_FORMAT)
            .map_err(|e| CoreError::InvalidSessionWindow(format!("start '{start}': {e}")))?;
        let end = NaiveTime::parse_from_str(end, TIME_FORMAT)
            .map_err(|e| CoreError::InvalidSessionWindow(format!("end '{end}': {e}")))?;

        if start >= end {
            return Err(CoreError::InvalidSessionWindow(format!(
                "start {start} is not before end {end}"
            )));
        }

        Ok(Self { start, end })
    }

    /// Gate one update's time-of-day.
    ///
    /// The end check has priority: exactly at the end time counts as the
    /// session close, not merely "outside the window".
    pub fn gate(&self, tod: NaiveTime) -> SessionGate {
        if tod >= self.end {
            SessionGate::AtClose
        } else if tod < self.start {
            SessionGate::BeforeOpen
        } else {
            SessionGate::Open
        }
    }
}

impl Default for SessionWindow {
    /// Regular US cash session with one minute of slack on each side.
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(9, 29, 0).expect("valid constant"),
            end: NaiveTime::from_hms_opt(16, 1, 0).expect("valid constant"),
        }
    }
}
