//! Feed-derived hints.
//!
//! A filing feed names a form type and, best effort, a ticker. A hint only
//! ever points at an entity that is already active under exactly that symbol;
//! it never creates entities or events. Callers use the matches to refresh
//! per-entity enrichment out of cycle.

use std::collections::{BTreeMap, HashMap};

use crate::{EntityKey, Event};

/// One parsed feed entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedSignal {
    pub form_type: String,
    pub symbol_hint: String,
}

/// A hint resolved to a known, active entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedMatch {
    pub key: EntityKey,
    pub symbol: String,
    /// Form types seen for this entity, in feed order, deduplicated.
    pub form_types: Vec<String>,
}

/// Resolve hints against the active latest events by exact symbol.
///
/// Hints are upper-cased before comparison. Unknown symbols are dropped.
/// One match per key, ascending key order.
pub fn match_feed_signals(signals: &[FeedSignal], active_latest: &[Event]) -> Vec<FeedMatch> {
    let by_symbol: HashMap<&str, &Event> = active_latest
        .iter()
        .filter(|e| e.is_active)
        .map(|e| (e.symbol.as_str(), e))
        .collect();

    let mut out: BTreeMap<EntityKey, FeedMatch> = BTreeMap::new();
    for s in signals {
        let hint = s.symbol_hint.trim().to_uppercase();
        let Some(ev) = by_symbol.get(hint.as_str()) else {
            continue;
        };
        let m = out.entry(ev.key).or_insert_with(|| FeedMatch {
            key: ev.key,
            symbol: ev.symbol.clone(),
            form_types: Vec::new(),
        });
        if !m.form_types.contains(&s.form_type) {
            m.form_types.push(s.form_type.clone());
        }
    }
    out.into_values().collect()
}
