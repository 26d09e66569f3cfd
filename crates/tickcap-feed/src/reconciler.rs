//! Tick reconciliation.
//!
//! Combines one incoming update with the prior symbol state to produce the
//! updated aggregate and the row to persist, enforcing the trading-session
//! window and session-close semantics.

use chrono::Local;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::debug;

use tickcap_core::row::INSTRUMENT_TYPE_STOCK;
use tickcap_core::{
    decimal_field, epoch_seconds_of, int_field, normalize::opt_decimal_field, time_of_day_of,
    Price, QuoteRow, SessionGate, SessionWindow, ASK, ASK_SIZE, BID, BID_SIZE, LAST_PRICE, VOLUME,
};

use crate::aggregate::SymbolStateStore;

/// Result of reconciling one update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Inside the session window; persist the row and keep consuming.
    InSession(QuoteRow),
    /// The update reached the session end: the close price has been
    /// recorded on the aggregate, this final row should be persisted, and
    /// the caller must stop consuming the stream.
    SessionEnd(QuoteRow),
    /// The update fell before session start: persist nothing, stop
    /// consuming.
    BeforeOpen,
}

/// Stateful tick reconciler.
///
/// Owns the symbol state store; single-threaded by contract (updates are
/// reconciled strictly in arrival order).
#[derive(Debug, Default)]
pub struct TickReconciler {
    window: SessionWindow,
    store: SymbolStateStore,
}

impl TickReconciler {
    pub fn new(window: SessionWindow) -> Self {
        Self {
            window,
            store: SymbolStateStore::new(),
        }
    }

    /// Seed per-symbol state from previously persisted rows.
    pub fn rehydrate<'a>(&mut self, rows: impl IntoIterator<Item = &'a QuoteRow>) {
        self.store.rehydrate(rows);
    }

    /// Read access to the symbol state, mainly for inspection in tests.
    pub fn state(&self) -> &SymbolStateStore {
        &self.store
    }

    /// Reconcile one update for one symbol.
    ///
    /// `dt_str` is the already-resolved canonical timestamp. The aggregate
    /// is advanced even when the outcome is terminal, so a final row always
    /// reflects the triggering update.
    pub fn reconcile(
        &mut self,
        symbol: &str,
        fields: &Map<String, Value>,
        dt_str: &str,
    ) -> TickOutcome {
        let bid = Price::new(decimal_field(fields, BID, Decimal::ZERO));
        let ask = Price::new(decimal_field(fields, ASK, Decimal::ZERO));
        let raw_last = opt_decimal_field(fields, LAST_PRICE).map(Price::new);

        let midpoint = if bid.is_positive() && ask.is_positive() {
            Some(bid.midpoint(ask))
        } else {
            None
        };

        // Carried values from the prior aggregate; an unseen symbol carries
        // zeros.
        let (prior_last, carried_bid, carried_ask, carried_bid_size, carried_ask_size) =
            match self.store.get(symbol) {
                Some(agg) => (
                    agg.last_price,
                    agg.last_bid,
                    agg.last_ask,
                    agg.last_bid_size,
                    agg.last_ask_size,
                ),
                None => (Price::ZERO, Price::ZERO, Price::ZERO, 0, 0),
            };

        // Price precedence: raw trade > quote midpoint > carried last.
        let price = raw_last.or(midpoint).unwrap_or(prior_last);

        let final_bid = if bid.is_positive() { bid } else { carried_bid };
        let final_ask = if ask.is_positive() { ask } else { carried_ask };

        let volume = int_field(fields, VOLUME);
        let bid_size = int_field(fields, BID_SIZE);
        let ask_size = int_field(fields, ASK_SIZE);

        let final_bid_size = if bid_size > 0 {
            bid_size
        } else {
            carried_bid_size
        };
        let final_ask_size = if ask_size > 0 {
            ask_size
        } else {
            carried_ask_size
        };

        // The store receives the RAW extracted sizes and re-applies its own
        // carry rule; the carried sizes above are for the persisted row
        // only. This asymmetry mirrors the capture semantics exactly.
        self.store
            .apply(symbol, price, final_bid, final_ask, bid_size, ask_size);

        let tod = time_of_day_of(dt_str).unwrap_or_else(|| Local::now().time());
        let gate = self.window.gate(tod);

        if gate == SessionGate::AtClose {
            self.store.record_close(symbol, price);
        }

        if gate == SessionGate::BeforeOpen {
            debug!(symbol, %tod, "Update before session start");
            return TickOutcome::BeforeOpen;
        }

        let agg = self
            .store
            .get(symbol)
            .expect("aggregate exists after apply");

        let row = QuoteRow {
            dt: dt_str.to_string(),
            symbol: symbol.to_string(),
            instrument_type: INSTRUMENT_TYPE_STOCK.to_string(),
            price,
            comment: epoch_seconds_of(dt_str).to_string(),
            volume,
            bid: final_bid,
            ask: final_ask,
            bid_size: final_bid_size,
            ask_size: final_ask_size,
            high: agg.high,
            low: agg.low,
            close: agg.close,
            open: agg.open,
        };

        match gate {
            SessionGate::Open => TickOutcome::InSession(row),
            SessionGate::AtClose => TickOutcome::SessionEnd(row),
            SessionGate::BeforeOpen => unreachable!("handled above"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn fields(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn in_session(outcome: TickOutcome) -> QuoteRow {
        match outcome {
            TickOutcome::InSession(row) => row,
            other => panic!("expected InSession, got {other:?}"),
        }
    }

    fn reconciler() -> TickReconciler {
        TickReconciler::new(SessionWindow::default())
    }

    const DT: &str = "2025-06-02 10:15:00";

    #[test]
    fn test_trade_price_takes_precedence() {
        let mut r = reconciler();
        let f = fields(&[
            (LAST_PRICE, json!("18.28")),
            (BID, json!("18.00")),
            (ASK, json!("19.00")),
        ]);

        let row = in_session(r.reconcile("PDI", &f, DT));
        assert_eq!(row.price, Price::new(dec!(18.28)));
    }

    #[test]
    fn test_midpoint_fallback() {
        let mut r = reconciler();
        let f = fields(&[(BID, json!("100")), (ASK, json!("102"))]);

        let row = in_session(r.reconcile("SPY", &f, DT));
        assert_eq!(row.price, Price::new(dec!(101)));
    }

    #[test]
    fn test_carried_last_price_double_fallback() {
        let mut r = reconciler();
        let seed = fields(&[(LAST_PRICE, json!("50"))]);
        in_session(r.reconcile("PDI", &seed, DT));

        // No trade, no quote: falls back to the carried last price.
        let empty = fields(&[]);
        let row = in_session(r.reconcile("PDI", &empty, DT));
        assert_eq!(row.price, Price::new(dec!(50)));
    }

    #[test]
    fn test_unseen_symbol_no_fields_prices_at_zero() {
        let mut r = reconciler();
        let row = in_session(r.reconcile("TNX", &fields(&[]), DT));
        assert_eq!(row.price, Price::ZERO);
    }

    #[test]
    fn test_one_sided_quote_does_not_form_midpoint() {
        let mut r = reconciler();
        let seed = fields(&[(LAST_PRICE, json!("40"))]);
        in_session(r.reconcile("DIA", &seed, DT));

        let f = fields(&[(BID, json!("39.5"))]);
        let row = in_session(r.reconcile("DIA", &f, DT));
        assert_eq!(row.price, Price::new(dec!(40)));
    }

    #[test]
    fn test_carry_forward_idempotence() {
        let mut r = reconciler();
        let full = fields(&[
            (LAST_PRICE, json!("18.28")),
            (BID, json!("18.27")),
            (ASK, json!("18.30")),
            (BID_SIZE, json!("26")),
            (ASK_SIZE, json!("16")),
        ]);
        in_session(r.reconcile("PDI", &full, DT));

        let sparse = fields(&[(LAST_PRICE, json!("18.29"))]);
        let row = in_session(r.reconcile("PDI", &sparse, DT));

        assert_eq!(row.bid, Price::new(dec!(18.27)));
        assert_eq!(row.ask, Price::new(dec!(18.30)));
        assert_eq!(row.bid_size, 26);
        assert_eq!(row.ask_size, 16);

        let agg = r.state().get("PDI").unwrap();
        assert_eq!(agg.last_bid, Price::new(dec!(18.27)));
        assert_eq!(agg.last_ask, Price::new(dec!(18.30)));
        assert_eq!(agg.last_bid_size, 26);
        assert_eq!(agg.last_ask_size, 16);
    }

    #[test]
    fn test_malformed_volume_persists_zero() {
        let mut r = reconciler();
        let f = fields(&[(LAST_PRICE, json!("10")), (VOLUME, json!("abc"))]);

        let row = in_session(r.reconcile("BTC", &f, DT));
        assert_eq!(row.volume, 0);
    }

    #[test]
    fn test_volume_million_suffix() {
        let mut r = reconciler();
        let f = fields(&[(LAST_PRICE, json!("10")), (VOLUME, json!("2M"))]);

        let row = in_session(r.reconcile("BTC", &f, DT));
        assert_eq!(row.volume, 2_000_000);
    }

    #[test]
    fn test_comment_carries_epoch_seconds() {
        let mut r = reconciler();
        let f = fields(&[(LAST_PRICE, json!("10"))]);

        let row = in_session(r.reconcile("SPY", &f, DT));
        assert_eq!(row.comment, epoch_seconds_of(DT).to_string());
        assert_ne!(row.comment, "0");
    }

    #[test]
    fn test_session_end_records_close_and_terminates() {
        let mut r = reconciler();
        let f = fields(&[(LAST_PRICE, json!("18.28"))]);

        let outcome = r.reconcile("PDI", &f, "2025-06-02 16:01:00");
        let row = match outcome {
            TickOutcome::SessionEnd(row) => row,
            other => panic!("expected SessionEnd, got {other:?}"),
        };

        assert_eq!(row.close, Price::new(dec!(18.28)));
        assert_eq!(
            r.state().get("PDI").unwrap().close,
            Price::new(dec!(18.28))
        );
    }

    #[test]
    fn test_before_open_terminates_without_row() {
        let mut r = reconciler();
        let f = fields(&[(LAST_PRICE, json!("18.28"))]);

        let outcome = r.reconcile("PDI", &f, "2025-06-02 08:00:00");
        assert_eq!(outcome, TickOutcome::BeforeOpen);

        // State still advanced, but no close recorded.
        let agg = r.state().get("PDI").unwrap();
        assert_eq!(agg.last_price, Price::new(dec!(18.28)));
        assert_eq!(agg.close, Price::ZERO);
    }

    #[test]
    fn test_close_not_reset_in_session() {
        let mut r = reconciler();
        let f = fields(&[(LAST_PRICE, json!("18.28"))]);
        in_session(r.reconcile("PDI", &f, DT));

        assert_eq!(r.state().get("PDI").unwrap().close, Price::ZERO);
    }

    #[test]
    fn test_row_reflects_ohlc_after_sequence() {
        let mut r = reconciler();
        for px in ["100", "103", "98", "101"] {
            let f = fields(&[(LAST_PRICE, json!(px))]);
            in_session(r.reconcile("QQQ", &f, DT));
        }

        let f = fields(&[(LAST_PRICE, json!("99"))]);
        let row = in_session(r.reconcile("QQQ", &f, DT));

        assert_eq!(row.open, Price::new(dec!(100)));
        assert_eq!(row.high, Price::new(dec!(103)));
        assert_eq!(row.low, Price::new(dec!(98)));
        assert_eq!(row.price, Price::new(dec!(99)));
        assert!(row.low <= row.price && row.price <= row.high);
    }
}
