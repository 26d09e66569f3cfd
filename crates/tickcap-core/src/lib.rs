//! Core domain types for the tickcap quote capture daemon.
//!
//! This crate provides the fundamental pieces used throughout the pipeline:
//! - `Price`: precision-safe decimal price type
//! - `QuoteRow`: the denormalized per-(timestamp, symbol) snapshot
//! - field normalization helpers for loosely-typed broker fields
//! - timestamp resolution with wall-clock fallback
//! - trading-session window gating

pub mod error;
pub mod fields;
pub mod normalize;
pub mod price;
pub mod row;
pub mod session;
pub mod timestamp;

pub use error::{CoreError, Result};
pub use fields::{ASK, ASK_SIZE, BID, BID_SIZE, LAST_PRICE, TIMESTAMP_MS, VOLUME};
pub use normalize::{decimal_field, int_field};
pub use price::Price;
pub use row::QuoteRow;
pub use session::{SessionGate, SessionWindow};
pub use timestamp::{epoch_seconds_of, resolve_timestamp, time_of_day_of};
