use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{EntityKey, Event, EventLog, LogError, ScenarioKind};

/// One row of the materialized view: an active key and its latest event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProjectionRow {
    pub symbol: String,
    pub key: EntityKey,
    pub name: String,
    pub scenario_kind: ScenarioKind,
    pub scenario_detail: String,
    pub observed_at: DateTime<Utc>,
}

impl From<&Event> for ProjectionRow {
    fn from(e: &Event) -> Self {
        Self {
            symbol: e.symbol.clone(),
            key: e.key,
            name: e.display_name.clone(),
            scenario_kind: e.kind(),
            scenario_detail: e.scenario.detail_text(),
            observed_at: e.observed_at,
        }
    }
}

/// Project the store's current content. Read-only; repeatable.
pub async fn project(log: &dyn EventLog) -> Result<Vec<ProjectionRow>, LogError> {
    Ok(project_events(log.all_active_latest().await?))
}

/// Pure projection over any event sequence.
///
/// Keeps the latest event per key, drops keys whose latest event is
/// inactive, and sorts by `(symbol, key)`.
pub fn project_events<I>(events: I) -> Vec<ProjectionRow>
where
    I: IntoIterator<Item = Event>,
{
    let mut latest: BTreeMap<EntityKey, Event> = BTreeMap::new();
    for e in events {
        match latest.get(&e.key) {
            Some(cur) if cur.observed_at >= e.observed_at => {}
            _ => {
                latest.insert(e.key, e);
            }
        }
    }

    let mut rows: Vec<ProjectionRow> = latest
        .values()
        .filter(|e| e.is_active)
        .map(ProjectionRow::from)
        .collect();
    rows.sort_by(|a, b| a.symbol.cmp(&b.symbol).then(a.key.cmp(&b.key)));
    rows
}
