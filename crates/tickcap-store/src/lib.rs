//! Idempotent quote snapshot storage for tickcap.
//!
//! One SQLite table per capture day, keyed by (timestamp, symbol).
//! Writes are upserts: replaying an update for an existing key replaces
//! every non-key column.

pub mod error;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::{daily_table_name, QuoteStore};
