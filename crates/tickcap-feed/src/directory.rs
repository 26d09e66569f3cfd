//! Static instrument-identifier directory.

use std::collections::HashMap;

/// Maps broker contract identifiers to display symbols.
///
/// Resolution is total: an unknown identifier yields a stable placeholder
/// rather than dropping the message.
#[derive(Debug, Clone, Default)]
pub struct SymbolDirectory {
    by_conid: HashMap<String, String>,
}

impl SymbolDirectory {
    pub fn new(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            by_conid: pairs.into_iter().collect(),
        }
    }

    /// Resolve a conid to its symbol, or `UNKNOWN-<conid>` when unmapped.
    pub fn resolve(&self, conid: &str) -> String {
        self.by_conid
            .get(conid)
            .cloned()
            .unwrap_or_else(|| format!("UNKNOWN-{conid}"))
    }

    /// The identifiers to subscribe to, in arbitrary order.
    pub fn conids(&self) -> impl Iterator<Item = &str> {
        self.by_conid.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_conid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_conid.is_empty()
    }
}
