use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable external identifier (SEC CIK). Never reused across entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(pub u64);

impl EntityKey {
    pub fn get(self) -> u64 {
        self.0
    }

    /// Ten-digit zero-padded form used in EDGAR URLs.
    pub fn padded(self) -> String {
        format!("{:010}", self.0)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityKey {
    fn from(v: u64) -> Self {
        EntityKey(v)
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One directory entry as observed in a single cycle. Compared, never stored.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotRecord {
    pub key: EntityKey,
    pub symbol: String,
    pub display_name: String,
}

impl SnapshotRecord {
    /// Symbols are upper-cased; both text fields are trimmed.
    pub fn new(key: u64, symbol: &str, display_name: &str) -> Self {
        Self {
            key: EntityKey(key),
            symbol: symbol.trim().to_uppercase(),
            display_name: display_name.trim().to_string(),
        }
    }
}

/// Full directory population for one cycle, one record per key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    records: BTreeMap<EntityKey, SnapshotRecord>,
    collapsed: usize,
}

impl Snapshot {
    /// Build from records in directory order.
    ///
    /// The directory can list one key several times (one row per share
    /// class). The last occurrence wins; every replaced row is counted in
    /// [`Snapshot::collapsed`].
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = SnapshotRecord>,
    {
        let mut out = Snapshot::default();
        for r in records {
            if out.records.insert(r.key, r).is_some() {
                out.collapsed += 1;
            }
        }
        out
    }

    pub fn get(&self, key: EntityKey) -> Option<&SnapshotRecord> {
        self.records.get(&key)
    }

    pub fn keys(&self) -> BTreeSet<EntityKey> {
        self.records.keys().copied().collect()
    }

    /// Records in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = &SnapshotRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Duplicate-key rows dropped while building.
    pub fn collapsed(&self) -> usize {
        self.collapsed
    }
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

/// Classification tag stored with every event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioKind {
    Baseline,
    NewEntry,
    SymbolChange,
    NameChange,
    Reinstated,
    Removed,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 6] = [
        ScenarioKind::Baseline,
        ScenarioKind::NewEntry,
        ScenarioKind::SymbolChange,
        ScenarioKind::NameChange,
        ScenarioKind::Reinstated,
        ScenarioKind::Removed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioKind::Baseline => "BASELINE",
            ScenarioKind::NewEntry => "NEW_ENTRY",
            ScenarioKind::SymbolChange => "SYMBOL_CHANGE",
            ScenarioKind::NameChange => "NAME_CHANGE",
            ScenarioKind::Reinstated => "REINSTATED",
            ScenarioKind::Removed => "REMOVED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        ScenarioKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim())
    }

    /// Only a removal deactivates; every other scenario (re)activates.
    pub fn is_active(&self) -> bool {
        !matches!(self, ScenarioKind::Removed)
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified transition with its detail payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scenario {
    Baseline,
    NewEntry,
    SymbolChange { from: String, to: String },
    NameChange { from: String, to: String },
    Reinstated,
    Removed,
}

impl Scenario {
    pub fn kind(&self) -> ScenarioKind {
        match self {
            Scenario::Baseline => ScenarioKind::Baseline,
            Scenario::NewEntry => ScenarioKind::NewEntry,
            Scenario::SymbolChange { .. } => ScenarioKind::SymbolChange,
            Scenario::NameChange { .. } => ScenarioKind::NameChange,
            Scenario::Reinstated => ScenarioKind::Reinstated,
            Scenario::Removed => ScenarioKind::Removed,
        }
    }

    /// `(old, new)` for change scenarios.
    pub fn detail(&self) -> Option<(&str, &str)> {
        match self {
            Scenario::SymbolChange { from, to } | Scenario::NameChange { from, to } => {
                Some((from.as_str(), to.as_str()))
            }
            _ => None,
        }
    }

    /// Human form of the detail: `OLD → NEW`, or `-` when there is none.
    pub fn detail_text(&self) -> String {
        match self.detail() {
            Some((from, to)) => format!("{from} → {to}"),
            None => "-".to_string(),
        }
    }

    /// Rebuild from the persisted `(kind, from, to)` columns.
    ///
    /// Returns `None` when a change kind lacks its detail.
    pub fn from_parts(kind: ScenarioKind, from: Option<String>, to: Option<String>) -> Option<Self> {
        Some(match kind {
            ScenarioKind::Baseline => Scenario::Baseline,
            ScenarioKind::NewEntry => Scenario::NewEntry,
            ScenarioKind::SymbolChange => Scenario::SymbolChange { from: from?, to: to? },
            ScenarioKind::NameChange => Scenario::NameChange { from: from?, to: to? },
            ScenarioKind::Reinstated => Scenario::Reinstated,
            ScenarioKind::Removed => Scenario::Removed,
        })
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Immutable classified fact. Appended, never edited.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub key: EntityKey,
    pub symbol: String,
    pub display_name: String,
    pub scenario: Scenario,
    pub is_active: bool,
    pub observed_at: DateTime<Utc>,
}

impl Event {
    /// Event carrying the full incoming record. Activity follows the scenario.
    pub fn from_record(
        record: &SnapshotRecord,
        scenario: Scenario,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key: record.key,
            symbol: record.symbol.clone(),
            display_name: record.display_name.clone(),
            is_active: scenario.kind().is_active(),
            scenario,
            observed_at,
        }
    }

    /// Removal of `latest`, carrying its last known symbol and name forward.
    pub fn removal_of(latest: &Event, observed_at: DateTime<Utc>) -> Self {
        Self {
            key: latest.key,
            symbol: latest.symbol.clone(),
            display_name: latest.display_name.clone(),
            scenario: Scenario::Removed,
            is_active: false,
            observed_at,
        }
    }

    pub fn kind(&self) -> ScenarioKind {
        self.scenario.kind()
    }

    /// `is_active` agrees with the scenario (only a removal is inactive).
    pub fn is_consistent(&self) -> bool {
        self.is_active == self.kind().is_active()
    }
}
