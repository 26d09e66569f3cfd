//! Broker field codes.
//!
//! The streaming API keys tick fields by numeric code. Only the codes the
//! pipeline reads are named here; the full requested set lives in config.

/// Last trade price.
pub const LAST_PRICE: &str = "31";
/// Source-supplied event timestamp, epoch milliseconds.
pub const TIMESTAMP_MS: &str = "83";
/// Best bid price.
pub const BID: &str = "84";
/// Best bid size.
pub const BID_SIZE: &str = "85";
/// Best ask price.
pub const ASK: &str = "86";
/// Best ask size.
pub const ASK_SIZE: &str = "88";
/// Cumulative session volume.
pub const VOLUME: &str = "89";
