//! Event log store contract.
//!
//! Append-only. No update or delete exists on the trait; a correction is a
//! new event. Per key, events are totally ordered by `observed_at` and an
//! append must be strictly newer than the key's latest event.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::{EntityKey, Event, ScenarioKind};

/// Errors a store implementation may return.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogError {
    /// Append is not strictly newer than the key's latest event.
    OutOfOrder {
        key: EntityKey,
        latest: DateTime<Utc>,
        got: DateTime<Utc>,
    },
    /// Event's `is_active` flag contradicts its scenario kind.
    Inconsistent {
        key: EntityKey,
        kind: ScenarioKind,
        is_active: bool,
    },
    /// Storage backend failure (connection, query, decode).
    Backend(String),
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogError::OutOfOrder { key, latest, got } => write!(
                f,
                "out-of-order append for key {key}: latest={} got={}",
                latest.to_rfc3339(),
                got.to_rfc3339()
            ),
            LogError::Inconsistent {
                key,
                kind,
                is_active,
            } => write!(f, "inconsistent event for key {key}: kind={kind} is_active={is_active}"),
            LogError::Backend(msg) => write!(f, "event log backend error: {msg}"),
        }
    }
}

impl std::error::Error for LogError {}

/// Append-only history of classified events.
///
/// `append` is atomic and must be consistent with `latest_for`: an
/// implementation re-checks ordering inside the same critical section that
/// writes, so two writers deciding from the same read cannot both succeed.
#[async_trait::async_trait]
pub trait EventLog: Send + Sync {
    async fn append(&self, event: &Event) -> Result<(), LogError>;

    async fn latest_for(&self, key: EntityKey) -> Result<Option<Event>, LogError>;

    /// Latest event of every key whose latest event is active, ascending key order.
    async fn all_active_latest(&self) -> Result<Vec<Event>, LogError>;

    async fn is_empty(&self) -> Result<bool, LogError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Process-local store. Used by tests and `--dry-run` cycles.
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    by_key: Mutex<BTreeMap<EntityKey, Vec<Event>>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from an existing history (e.g. loaded from Postgres for a dry run).
    /// Events are appended in the given order and must respect per-key ordering.
    pub fn from_events<I>(events: I) -> Result<Self, LogError>
    where
        I: IntoIterator<Item = Event>,
    {
        let log = Self::new();
        {
            let mut g = log.lock()?;
            for ev in events {
                check_append(g.get(&ev.key).and_then(|h| h.last()), &ev)?;
                g.entry(ev.key).or_default().push(ev);
            }
        }
        Ok(log)
    }

    /// Full history of one key, oldest first.
    pub fn history(&self, key: EntityKey) -> Vec<Event> {
        self.lock()
            .map(|g| g.get(&key).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Total number of events across all keys.
    pub fn len(&self) -> usize {
        self.lock()
            .map(|g| g.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<EntityKey, Vec<Event>>>, LogError> {
        self.by_key
            .lock()
            .map_err(|_| LogError::Backend("memory log mutex poisoned".to_string()))
    }
}

/// Rejects an event whose activity flag contradicts its kind.
pub fn check_consistent(ev: &Event) -> Result<(), LogError> {
    if ev.is_consistent() {
        return Ok(());
    }
    Err(LogError::Inconsistent {
        key: ev.key,
        kind: ev.kind(),
        is_active: ev.is_active,
    })
}

fn check_append(latest: Option<&Event>, ev: &Event) -> Result<(), LogError> {
    check_consistent(ev)?;
    match latest {
        Some(l) if ev.observed_at <= l.observed_at => Err(LogError::OutOfOrder {
            key: ev.key,
            latest: l.observed_at,
            got: ev.observed_at,
        }),
        _ => Ok(()),
    }
}

#[async_trait::async_trait]
impl EventLog for MemoryEventLog {
    async fn append(&self, event: &Event) -> Result<(), LogError> {
        let mut g = self.lock()?;
        check_append(g.get(&event.key).and_then(|h| h.last()), event)?;
        g.entry(event.key).or_default().push(event.clone());
        Ok(())
    }

    async fn latest_for(&self, key: EntityKey) -> Result<Option<Event>, LogError> {
        let g = self.lock()?;
        Ok(g.get(&key).and_then(|h| h.last()).cloned())
    }

    async fn all_active_latest(&self) -> Result<Vec<Event>, LogError> {
        let g = self.lock()?;
        Ok(g.values()
            .filter_map(|h| h.last())
            .filter(|e| e.is_active)
            .cloned()
            .collect())
    }

    async fn is_empty(&self) -> Result<bool, LogError> {
        let g = self.lock()?;
        Ok(g.values().all(Vec::is_empty))
    }
}
