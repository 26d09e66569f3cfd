//! Tick normalization and per-symbol aggregation for tickcap.
//!
//! Takes arbitrary, partially-populated tick updates and produces a
//! consistent per-symbol running state (OHLC plus last-known quote) and a
//! persistable snapshot row per accepted update.

pub mod aggregate;
pub mod decoder;
pub mod directory;
pub mod error;
pub mod reconciler;

pub use aggregate::{SymbolAggregate, SymbolStateStore};
pub use decoder::{decode_tick, TickUpdate};
pub use directory::SymbolDirectory;
pub use error::{FeedError, FeedResult};
pub use reconciler::{TickOutcome, TickReconciler};
