use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::{EntityKey, Event};

/// Removal sweep.
///
/// `active_latest` must be read *after* the cycle's per-key appends. Every
/// active key missing from `incoming` gets one `Removed` event carrying its
/// last known symbol and name. Output is in ascending key order.
pub fn sweep(
    incoming: &BTreeSet<EntityKey>,
    active_latest: &[Event],
    observed_at: DateTime<Utc>,
) -> Vec<Event> {
    let mut out: Vec<Event> = active_latest
        .iter()
        .filter(|e| e.is_active && !incoming.contains(&e.key))
        .map(|e| Event::removal_of(e, observed_at))
        .collect();
    out.sort_by_key(|e| e.key);
    out.dedup_by_key(|e| e.key);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Scenario, ScenarioKind};
    use chrono::TimeZone;

    fn active(key: u64, symbol: &str) -> Event {
        Event {
            key: EntityKey(key),
            symbol: symbol.to_string(),
            display_name: format!("{symbol} Inc"),
            scenario: Scenario::Baseline,
            is_active: true,
            observed_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn absent_active_keys_are_removed_in_key_order() {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        let incoming: BTreeSet<EntityKey> = [EntityKey(2)].into_iter().collect();
        let got = sweep(&incoming, &[active(3, "CCC"), active(2, "BBB"), active(1, "AAA")], now);

        assert_eq!(got.len(), 2);
        assert_eq!(got[0].key, EntityKey(1));
        assert_eq!(got[1].key, EntityKey(3));
        for e in &got {
            assert_eq!(e.kind(), ScenarioKind::Removed);
            assert!(!e.is_active);
            assert_eq!(e.observed_at, now);
        }
        assert_eq!(got[1].symbol, "CCC");
        assert_eq!(got[1].display_name, "CCC Inc");
    }

    #[test]
    fn inactive_latest_is_not_removed_twice() {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        let mut gone = active(1, "AAA");
        gone.is_active = false;
        gone.scenario = Scenario::Removed;
        assert!(sweep(&BTreeSet::new(), &[gone], now).is_empty());
    }
}
