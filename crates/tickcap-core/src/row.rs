//! The persisted quote snapshot.

use crate::price::Price;
use serde::{Deserialize, Serialize};

/// Instrument type tag carried on every row. Only simple trade/quote
/// instruments flow through this pipeline.
pub const INSTRUMENT_TYPE_STOCK: &str = "STK";

/// Denormalized point-in-time snapshot for one (timestamp, symbol).
///
/// `(dt, symbol)` is the primary identity and the upsert key in the store.
/// `comment` carries the Unix-epoch seconds of the event, kept as text for
/// schema compatibility with the historical capture tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRow {
    /// Local timestamp, "%Y-%m-%d %H:%M:%S".
    pub dt: String,
    pub symbol: String,
    pub instrument_type: String,
    pub price: Price,
    /// Unix-epoch seconds of the event, as text.
    pub comment: String,
    pub volume: i64,
    pub bid: Price,
    pub ask: Price,
    pub bid_size: i64,
    pub ask_size: i64,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub open: Price,
}
