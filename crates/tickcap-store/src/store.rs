//! SQLite-backed quote store.
//!
//! Column names follow the historical capture schema (my_dt, my_symbol,
//! ...) so existing analysis tooling keeps working. Prices are stored as
//! TEXT to preserve decimal exactness.

use std::path::Path;
use std::str::FromStr;

use chrono::{Local, NaiveDate};
use rusqlite::{params, Connection, OpenFlags, Row};
use rust_decimal::Decimal;
use tracing::{debug, info};

use tickcap_core::{Price, QuoteRow};

use crate::error::{StoreError, StoreResult};

/// Table name for one capture day: q20250602.
pub fn daily_table_name(date: NaiveDate) -> String {
    format!("q{}", date.format("%Y%m%d"))
}

/// Quote snapshot store over one daily table.
pub struct QuoteStore {
    conn: Connection,
    table: String,
}

impl QuoteStore {
    /// Open (or create) the store at `path`, bound to today's table.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_for_date(path, Local::now().date_naive())
    }

    /// Open the store bound to a specific capture date's table.
    pub fn open_for_date(path: &Path, date: NaiveDate) -> StoreResult<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let conn = Connection::open_with_flags(path, flags)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        let store = Self {
            conn,
            table: daily_table_name(date),
        };
        store.init_schema()?;

        info!(table = %store.table, path = %path.display(), "Quote store opened");
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                my_dt TEXT NOT NULL,
                my_symbol TEXT NOT NULL,
                my_type TEXT NOT NULL,
                my_price TEXT NOT NULL,
                my_comment TEXT NOT NULL,
                my_volume INTEGER NOT NULL,
                my_bid TEXT NOT NULL,
                my_ask TEXT NOT NULL,
                my_bid_size INTEGER NOT NULL,
                my_ask_size INTEGER NOT NULL,
                my_high TEXT NOT NULL,
                my_low TEXT NOT NULL,
                my_close TEXT NOT NULL,
                my_open TEXT NOT NULL,
                PRIMARY KEY (my_dt, my_symbol)
            ) WITHOUT ROWID;",
            self.table
        ))?;
        Ok(())
    }

    /// The daily table this store writes to.
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Write-or-replace one snapshot keyed by (my_dt, my_symbol).
    ///
    /// All non-key columns are replaced on conflict.
    pub fn upsert(&self, row: &QuoteRow) -> StoreResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO {} (my_dt, my_symbol, my_type, my_price, my_comment, my_volume,
                    my_bid, my_ask, my_bid_size, my_ask_size, my_high, my_low, my_close, my_open)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                 ON CONFLICT (my_dt, my_symbol) DO UPDATE SET
                    my_type = excluded.my_type,
                    my_price = excluded.my_price,
                    my_comment = excluded.my_comment,
                    my_volume = excluded.my_volume,
                    my_bid = excluded.my_bid,
                    my_ask = excluded.my_ask,
                    my_bid_size = excluded.my_bid_size,
                    my_ask_size = excluded.my_ask_size,
                    my_high = excluded.my_high,
                    my_low = excluded.my_low,
                    my_close = excluded.my_close,
                    my_open = excluded.my_open",
                self.table
            ),
            params![
                row.dt,
                row.symbol,
                row.instrument_type,
                row.price.to_string(),
                row.comment,
                row.volume,
                row.bid.to_string(),
                row.ask.to_string(),
                row.bid_size,
                row.ask_size,
                row.high.to_string(),
                row.low.to_string(),
                row.close.to_string(),
                row.open.to_string(),
            ],
        )?;
        debug!(dt = %row.dt, symbol = %row.symbol, "Row upserted");
        Ok(())
    }

    /// Latest persisted row per symbol, for startup rehydration.
    pub fn latest_per_symbol(&self) -> StoreResult<Vec<QuoteRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT my_dt, my_symbol, my_type, my_price, my_comment, my_volume,
                    my_bid, my_ask, my_bid_size, my_ask_size, my_high, my_low, my_close, my_open
             FROM {}
             ORDER BY my_dt DESC",
            self.table
        ))?;

        let mut seen = std::collections::HashSet::new();
        let mut latest = Vec::new();

        let rows = stmt.query_map([], row_from_sql)?;
        for row in rows {
            let row = row??;
            if seen.insert(row.symbol.clone()) {
                latest.push(row);
            }
        }

        Ok(latest)
    }

    /// Number of rows in the daily table.
    pub fn row_count(&self) -> StoreResult<i64> {
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.table),
            [],
            |r| r.get(0),
        )?;
        Ok(count)
    }
}

type SqlResult<T> = Result<T, rusqlite::Error>;

fn row_from_sql(row: &Row<'_>) -> SqlResult<StoreResult<QuoteRow>> {
    let dt: String = row.get(0)?;
    let symbol: String = row.get(1)?;
    let instrument_type: String = row.get(2)?;
    let price: String = row.get(3)?;
    let comment: String = row.get(4)?;
    let volume: i64 = row.get(5)?;
    let bid: String = row.get(6)?;
    let ask: String = row.get(7)?;
    let bid_size: i64 = row.get(8)?;
    let ask_size: i64 = row.get(9)?;
    let high: String = row.get(10)?;
    let low: String = row.get(11)?;
    let close: String = row.get(12)?;
    let open: String = row.get(13)?;

    Ok(build_row(
        dt,
        symbol,
        instrument_type,
        [price, bid, ask, high, low, close, open],
        comment,
        volume,
        bid_size,
        ask_size,
    ))
}

#[allow(clippy::too_many_arguments)]
fn build_row(
    dt: String,
    symbol: String,
    instrument_type: String,
    prices: [String; 7],
    comment: String,
    volume: i64,
    bid_size: i64,
    ask_size: i64,
) -> StoreResult<QuoteRow> {
    let parse = |s: &str| -> StoreResult<Price> {
        Decimal::from_str(s)
            .map(Price::new)
            .map_err(|e| StoreError::InvalidRow(format!("bad price '{s}': {e}")))
    };

    let [price, bid, ask, high, low, close, open] = prices;

    Ok(QuoteRow {
        dt,
        symbol,
        instrument_type,
        price: parse(&price)?,
        comment,
        volume,
        bid: parse(&bid)?,
        ask: parse(&ask)?,
        bid_size,
        ask_size,
        high: parse(&high)?,
        low: parse(&low)?,
        close: parse(&close)?,
        open: parse(&open)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn p(v: Decimal) -> Price {
        Price::new(v)
    }

    fn make_row(dt: &str, symbol: &str, price: Decimal) -> QuoteRow {
        QuoteRow {
            dt: dt.to_string(),
            symbol: symbol.to_string(),
            instrument_type: "STK".to_string(),
            price: p(price),
            comment: "1748872800".to_string(),
            volume: 436,
            bid: p(dec!(18.27)),
            ask: p(dec!(18.30)),
            bid_size: 26,
            ask_size: 16,
            high: p(dec!(18.28)),
            low: p(dec!(18.27)),
            close: Price::ZERO,
            open: p(dec!(18.27)),
        }
    }

    fn open_store(dir: &TempDir) -> QuoteStore {
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        QuoteStore::open_for_date(&dir.path().join("quotes.db"), date).unwrap()
    }

    #[test]
    fn test_daily_table_name() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        assert_eq!(daily_table_name(date), "q20250602");
    }

    #[test]
    fn test_upsert_and_read_back() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let row = make_row("2025-06-02 09:30:24", "PDI", dec!(18.28));
        store.upsert(&row).unwrap();

        let latest = store.latest_per_symbol().unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0], row);
    }

    #[test]
    fn test_upsert_idempotence_second_write_wins() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let first = make_row("2025-06-02 09:30:24", "PDI", dec!(18.28));
        let mut second = first.clone();
        second.price = p(dec!(18.99));
        second.volume = 999;

        store.upsert(&first).unwrap();
        store.upsert(&second).unwrap();

        assert_eq!(store.row_count().unwrap(), 1);
        let latest = store.latest_per_symbol().unwrap();
        assert_eq!(latest[0].price, p(dec!(18.99)));
        assert_eq!(latest[0].volume, 999);
    }

    #[test]
    fn test_latest_per_symbol_picks_newest() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store
            .upsert(&make_row("2025-06-02 09:30:00", "PDI", dec!(18.20)))
            .unwrap();
        store
            .upsert(&make_row("2025-06-02 10:45:00", "PDI", dec!(18.40)))
            .unwrap();
        store
            .upsert(&make_row("2025-06-02 10:00:00", "SPY", dec!(500)))
            .unwrap();

        let mut latest = store.latest_per_symbol().unwrap();
        latest.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].symbol, "PDI");
        assert_eq!(latest[0].price, p(dec!(18.40)));
        assert_eq!(latest[1].symbol, "SPY");
    }

    #[test]
    fn test_distinct_keys_both_stored() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store
            .upsert(&make_row("2025-06-02 09:30:24", "PDI", dec!(18.28)))
            .unwrap();
        store
            .upsert(&make_row("2025-06-02 09:30:25", "PDI", dec!(18.29)))
            .unwrap();

        assert_eq!(store.row_count().unwrap(), 2);
    }

    #[test]
    fn test_reopen_same_day_sees_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quotes.db");
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();

        {
            let store = QuoteStore::open_for_date(&path, date).unwrap();
            store
                .upsert(&make_row("2025-06-02 09:30:24", "PDI", dec!(18.28)))
                .unwrap();
        }

        let store = QuoteStore::open_for_date(&path, date).unwrap();
        assert_eq!(store.row_count().unwrap(), 1);
    }
}
