//! Per-symbol running session state.
//!
//! One `SymbolAggregate` per tracked symbol, owned exclusively by the
//! `SymbolStateStore` and mutated only through `apply` under the pipeline's
//! single-threaded discipline. Aggregates are created on first sight of a
//! symbol (or rehydrated at startup from the latest persisted row) and are
//! never deleted during a run.

use std::collections::HashMap;

use tickcap_core::{Price, QuoteRow};
use tracing::debug;

/// Running session statistics for one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolAggregate {
    pub high: Price,
    pub low: Price,
    pub open: Price,
    /// Zero until session-end detection records it.
    pub close: Price,
    /// True once an open price has been recorded for the current session.
    pub open_set: bool,
    pub last_price: Price,
    pub last_bid: Price,
    pub last_ask: Price,
    pub last_bid_size: i64,
    pub last_ask_size: i64,
}

impl SymbolAggregate {
    /// Fresh aggregate seeded from the first observed trade price.
    fn seeded(price: Price, bid: Price, ask: Price, bid_size: i64, ask_size: i64) -> Self {
        Self {
            high: price,
            low: price,
            open: price,
            close: Price::ZERO,
            open_set: false,
            last_price: price,
            last_bid: bid,
            last_ask: ask,
            last_bid_size: bid_size,
            last_ask_size: ask_size,
        }
    }

    /// Aggregate rebuilt from the latest persisted row for a symbol.
    ///
    /// Recreates session continuity across restarts: OHL carry over, the
    /// open is considered already set, but closing-price continuity and the
    /// live quote are not restored.
    fn rehydrated(row: &QuoteRow) -> Self {
        Self {
            high: row.high,
            low: row.low,
            open: row.open,
            close: Price::ZERO,
            open_set: true,
            last_price: row.open,
            last_bid: Price::ZERO,
            last_ask: Price::ZERO,
            last_bid_size: 0,
            last_ask_size: 0,
        }
    }
}

/// In-memory symbol -> aggregate mapping.
///
/// An explicit owned component rather than process-global state, so the
/// reconciler can be unit-tested in isolation.
#[derive(Debug, Default)]
pub struct SymbolStateStore {
    symbols: HashMap<String, SymbolAggregate>,
}

impl SymbolStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed aggregates from previously persisted rows, one per symbol.
    ///
    /// Callers pass the latest row per symbol; a symbol already present is
    /// left untouched.
    pub fn rehydrate<'a>(&mut self, rows: impl IntoIterator<Item = &'a QuoteRow>) {
        for row in rows {
            self.symbols
                .entry(row.symbol.clone())
                .or_insert_with(|| SymbolAggregate::rehydrated(row));
        }
        debug!(symbols = self.symbols.len(), "Symbol state rehydrated");
    }

    /// Current aggregate for a symbol, if seen.
    pub fn get(&self, symbol: &str) -> Option<&SymbolAggregate> {
        self.symbols.get(symbol)
    }

    /// The sole mutator: fold one accepted update into the aggregate.
    ///
    /// `bid_size` and `ask_size` are the raw extracted values; the store
    /// applies its own carry-forward rule (zero never overwrites).
    pub fn apply(
        &mut self,
        symbol: &str,
        price: Price,
        bid: Price,
        ask: Price,
        bid_size: i64,
        ask_size: i64,
    ) {
        let agg = self
            .symbols
            .entry(symbol.to_string())
            .or_insert_with(|| SymbolAggregate::seeded(price, bid, ask, bid_size, ask_size));

        agg.last_price = price;
        if bid.is_positive() {
            agg.last_bid = bid;
        }
        if ask.is_positive() {
            agg.last_ask = ask;
        }
        if bid_size > 0 {
            agg.last_bid_size = bid_size;
        }
        if ask_size > 0 {
            agg.last_ask_size = ask_size;
        }
        if !agg.open_set {
            agg.open = price;
            agg.open_set = true;
        }
        agg.high = agg.high.max(price);
        agg.low = agg.low.min(price);
    }

    /// Record the session closing price. Only session-end detection calls
    /// this; the close is never reset at session start.
    pub fn record_close(&mut self, symbol: &str, price: Price) {
        if let Some(agg) = self.symbols.get_mut(symbol) {
            agg.close = price;
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn p(v: rust_decimal::Decimal) -> Price {
        Price::new(v)
    }

    #[test]
    fn test_first_update_seeds_and_sets_open() {
        let mut store = SymbolStateStore::new();
        store.apply("SPY", p(dec!(500)), p(dec!(499.9)), p(dec!(500.1)), 10, 20);

        let agg = store.get("SPY").unwrap();
        assert_eq!(agg.open, p(dec!(500)));
        assert!(agg.open_set);
        assert_eq!(agg.high, p(dec!(500)));
        assert_eq!(agg.low, p(dec!(500)));
        assert_eq!(agg.last_bid_size, 10);
        assert_eq!(agg.last_ask_size, 20);
    }

    #[test]
    fn test_open_set_exactly_once() {
        let mut store = SymbolStateStore::new();
        store.apply("SPY", p(dec!(500)), Price::ZERO, Price::ZERO, 0, 0);
        store.apply("SPY", p(dec!(510)), Price::ZERO, Price::ZERO, 0, 0);
        store.apply("SPY", p(dec!(490)), Price::ZERO, Price::ZERO, 0, 0);

        let agg = store.get("SPY").unwrap();
        assert_eq!(agg.open, p(dec!(500)));
        assert_eq!(agg.high, p(dec!(510)));
        assert_eq!(agg.low, p(dec!(490)));
    }

    #[test]
    fn test_ohlc_invariant_holds_per_update() {
        let mut store = SymbolStateStore::new();
        let prices = [dec!(50), dec!(52), dec!(48), dec!(51), dec!(47.5)];

        for px in prices {
            store.apply("PDI", p(px), Price::ZERO, Price::ZERO, 0, 0);
            let agg = store.get("PDI").unwrap();
            assert!(agg.low <= agg.open && agg.open <= agg.high);
            assert!(agg.low <= agg.last_price && agg.last_price <= agg.high);
        }
    }

    #[test]
    fn test_zero_quote_never_overwrites() {
        let mut store = SymbolStateStore::new();
        store.apply("DIA", p(dec!(400)), p(dec!(399.9)), p(dec!(400.1)), 5, 7);
        store.apply("DIA", p(dec!(401)), Price::ZERO, Price::ZERO, 0, 0);

        let agg = store.get("DIA").unwrap();
        assert_eq!(agg.last_bid, p(dec!(399.9)));
        assert_eq!(agg.last_ask, p(dec!(400.1)));
        assert_eq!(agg.last_bid_size, 5);
        assert_eq!(agg.last_ask_size, 7);
    }

    #[test]
    fn test_rehydrate_restores_ohl_not_quote() {
        let row = QuoteRow {
            dt: "2025-06-02 10:00:00".to_string(),
            symbol: "QQQ".to_string(),
            instrument_type: "STK".to_string(),
            price: p(dec!(430)),
            comment: "1748872800".to_string(),
            volume: 1000,
            bid: p(dec!(429.9)),
            ask: p(dec!(430.1)),
            bid_size: 3,
            ask_size: 4,
            high: p(dec!(432)),
            low: p(dec!(428)),
            close: p(dec!(0)),
            open: p(dec!(429)),
        };

        let mut store = SymbolStateStore::new();
        store.rehydrate([&row]);

        let agg = store.get("QQQ").unwrap();
        assert!(agg.open_set);
        assert_eq!(agg.high, p(dec!(432)));
        assert_eq!(agg.low, p(dec!(428)));
        assert_eq!(agg.open, p(dec!(429)));
        assert_eq!(agg.last_price, p(dec!(429)));
        assert_eq!(agg.close, Price::ZERO);
        assert_eq!(agg.last_bid, Price::ZERO);
        assert_eq!(agg.last_ask, Price::ZERO);
        assert_eq!(agg.last_bid_size, 0);
        assert_eq!(agg.last_ask_size, 0);
    }

    #[test]
    fn test_rehydrate_does_not_clobber_live_state() {
        let mut store = SymbolStateStore::new();
        store.apply("VIX", p(dec!(15)), Price::ZERO, Price::ZERO, 0, 0);

        let row = QuoteRow {
            dt: "2025-06-02 09:30:00".to_string(),
            symbol: "VIX".to_string(),
            instrument_type: "STK".to_string(),
            price: p(dec!(14)),
            comment: "0".to_string(),
            volume: 0,
            bid: Price::ZERO,
            ask: Price::ZERO,
            bid_size: 0,
            ask_size: 0,
            high: p(dec!(14.5)),
            low: p(dec!(13.5)),
            close: Price::ZERO,
            open: p(dec!(14)),
        };
        store.rehydrate([&row]);

        assert_eq!(store.get("VIX").unwrap().last_price, p(dec!(15)));
    }

    #[test]
    fn test_record_close() {
        let mut store = SymbolStateStore::new();
        store.apply("SPY", p(dec!(500)), Price::ZERO, Price::ZERO, 0, 0);
        store.record_close("SPY", p(dec!(501)));

        assert_eq!(store.get("SPY").unwrap().close, p(dec!(501)));
    }
}
