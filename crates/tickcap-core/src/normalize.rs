//! Field normalization for loosely-typed broker tick fields.
//!
//! Tick fields arrive as JSON strings or numbers, sometimes with thousands
//! separators ("1,234.5") or a million-scale suffix ("2M"). Every parse
//! failure degrades to a caller-supplied default; nothing here can stop
//! the stream.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

/// Extract a decimal field, tolerating separators and scale suffixes.
///
/// Absent or unparsable values yield `default`. The `M` suffix is expanded
/// by literal substitution (`"2M"` -> `"2000000"`), matching the upstream
/// feed convention for abbreviated magnitudes.
pub fn decimal_field(fields: &Map<String, Value>, key: &str, default: Decimal) -> Decimal {
    let Some(raw) = stringify(fields.get(key)) else {
        return default;
    };
    clean(&raw).parse().unwrap_or(default)
}

/// Extract a decimal field that may be wholly absent.
///
/// Distinguishes "no value in this update" (`None`) from a parse failure
/// (also `None`): both mean the field contributes nothing.
pub fn opt_decimal_field(fields: &Map<String, Value>, key: &str) -> Option<Decimal> {
    let raw = stringify(fields.get(key))?;
    clean(&raw).parse().ok()
}

/// Extract an integer field.
///
/// Same textual cleanup as [`decimal_field`]; fractional values truncate
/// toward zero. Absent or unparsable values yield 0.
pub fn int_field(fields: &Map<String, Value>, key: &str) -> i64 {
    let Some(raw) = stringify(fields.get(key)) else {
        return 0;
    };
    let cleaned = clean(&raw);
    if cleaned.contains('.') {
        cleaned
            .parse::<Decimal>()
            .ok()
            .and_then(|d| d.trunc().to_i64())
            .unwrap_or(0)
    } else {
        cleaned.parse().unwrap_or(0)
    }
}

fn stringify(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn clean(raw: &str) -> String {
    raw.replace(',', "").replace('M', "000000")
}
