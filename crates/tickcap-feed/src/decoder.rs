//! Transport-message decoding.
//!
//! One websocket text frame becomes at most one `TickUpdate`. Frames
//! without a `conid` (status/heartbeat chatter) are ignored; frames that
//! fail to decode surface an error the driver logs and drops, never
//! crashing the stream.

use serde_json::{Map, Value};

use crate::error::{FeedError, FeedResult};

/// One decoded market-data update for one instrument.
#[derive(Debug, Clone)]
pub struct TickUpdate {
    /// Broker contract identifier, as text.
    pub conid: String,
    /// The full field mapping of the message; the reconciler picks out the
    /// codes it understands.
    pub fields: Map<String, Value>,
}

/// Decode one text frame.
///
/// Returns `Ok(None)` for well-formed frames that are not instrument
/// updates (no `conid` key).
pub fn decode_tick(text: &str) -> FeedResult<Option<TickUpdate>> {
    let value: Value = serde_json::from_str(text)?;

    let Value::Object(fields) = value else {
        return Err(FeedError::Decode(format!(
            "expected JSON object, got: {}",
            truncate(text)
        )));
    };

    let conid = match fields.get("conid") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(FeedError::Decode(format!(
                "conid is neither string nor number: {other}"
            )))
        }
        None => return Ok(None),
    };

    Ok(Some(TickUpdate { conid, fields }))
}

fn truncate(text: &str) -> &str {
    let limit = 80.min(text.len());
    // Avoid splitting a UTF-8 sequence.
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
