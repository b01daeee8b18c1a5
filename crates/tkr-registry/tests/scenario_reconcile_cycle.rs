//! Reconciliation cycle scenarios against the in-memory store.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use tkr_registry::*;
use tkr_revenue::{CompanyFacts, RevenueResolver};

// ---------------------------------------------------------------------------
// Fake directory
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeDirectory {
    snapshot: Mutex<Option<Snapshot>>,
    facts: BTreeMap<EntityKey, CompanyFacts>,
}

impl FakeDirectory {
    fn serving(records: Vec<SnapshotRecord>) -> Self {
        let d = FakeDirectory::default();
        d.set(records);
        d
    }

    fn set(&self, records: Vec<SnapshotRecord>) {
        *self.snapshot.lock().unwrap() = Some(Snapshot::from_records(records));
    }

    fn fail(&self) {
        *self.snapshot.lock().unwrap() = None;
    }
}

#[async_trait::async_trait]
impl Directory for FakeDirectory {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn fetch_snapshot(&self) -> Result<Snapshot, DirectoryError> {
        self.snapshot
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| DirectoryError::Transport("connection refused".to_string()))
    }

    async fn fetch_facts(&self, key: EntityKey) -> Result<CompanyFacts, DirectoryError> {
        self.facts.get(&key).cloned().ok_or(DirectoryError::Status {
            url: format!("https://data.sec.gov/api/xbrl/companyfacts/CIK{}.json", key.padded()),
            status: 404,
        })
    }
}

fn rec(key: u64, symbol: &str, name: &str) -> SnapshotRecord {
    SnapshotRecord::new(key, symbol, name)
}

fn t(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, day, 9, 0, 0).unwrap()
}

async fn cycle(dir: &FakeDirectory, log: &MemoryEventLog, day: u32) -> CycleReport {
    run_cycle(dir, log, CycleOptions::at(t(day)))
        .await
        .expect("cycle ok")
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_cycle_on_empty_log_seeds_baseline_only() {
    let dir = FakeDirectory::serving(vec![
        rec(1, "AAA", "Alpha"),
        rec(2, "BBB", "Beta"),
        rec(3, "CCC", "Gamma"),
    ]);
    let log = MemoryEventLog::new();

    let r = cycle(&dir, &log, 1).await;

    assert!(r.first_cycle);
    assert_eq!(r.appended.len(), 3);
    assert_eq!(r.count(ScenarioKind::Baseline), 3);
    assert_eq!(r.count(ScenarioKind::NewEntry), 0);
    for k in [1, 2, 3] {
        assert_eq!(log.history(EntityKey(k)).len(), 1, "exactly one event for key {k}");
    }
}

#[tokio::test]
async fn unseen_key_on_non_empty_log_is_new_entry() {
    let dir = FakeDirectory::serving(vec![rec(1, "AAA", "Alpha")]);
    let log = MemoryEventLog::new();
    cycle(&dir, &log, 1).await;

    dir.set(vec![rec(1, "AAA", "Alpha"), rec(2, "NEWC", "NewCo")]);
    let r = cycle(&dir, &log, 2).await;

    assert!(!r.first_cycle);
    assert_eq!(r.appended.len(), 1);
    assert_eq!(r.appended[0].key, EntityKey(2));
    assert_eq!(r.appended[0].kind(), ScenarioKind::NewEntry);
    assert!(r.appended[0].is_active);
}

#[tokio::test]
async fn symbol_change_is_recorded_and_becomes_latest() {
    let dir = FakeDirectory::serving(vec![rec(1, "AAA", "Alpha")]);
    let log = MemoryEventLog::new();
    cycle(&dir, &log, 1).await;

    dir.set(vec![rec(1, "BBB", "Alpha")]);
    let r = cycle(&dir, &log, 2).await;

    assert_eq!(r.appended.len(), 1);
    assert_eq!(r.appended[0].scenario.detail(), Some(("AAA", "BBB")));
    let latest = log.latest_for(EntityKey(1)).await.unwrap().unwrap();
    assert_eq!(latest.symbol, "BBB");
    assert!(latest.is_active);
}

#[tokio::test]
async fn simultaneous_symbol_and_name_change_yields_one_event_with_new_name() {
    let dir = FakeDirectory::serving(vec![rec(1, "AAM", "American Axle & Manufacturing")]);
    let log = MemoryEventLog::new();
    cycle(&dir, &log, 1).await;

    dir.set(vec![rec(1, "DCH", "Dauch Corp")]);
    let r = cycle(&dir, &log, 2).await;
    assert_eq!(r.appended.len(), 1);
    assert_eq!(r.appended[0].kind(), ScenarioKind::SymbolChange);
    assert_eq!(r.appended[0].display_name, "Dauch Corp");

    // Name is already current: the next cycle is a no-op.
    assert!(cycle(&dir, &log, 3).await.is_noop());
}

#[tokio::test]
async fn absent_key_is_removed_and_leaves_active_set() {
    let dir = FakeDirectory::serving(vec![rec(1, "BBB", "Beta"), rec(2, "KEEP", "Keeper")]);
    let log = MemoryEventLog::new();
    cycle(&dir, &log, 1).await;

    dir.set(vec![rec(2, "KEEP", "Keeper")]);
    let r = cycle(&dir, &log, 2).await;

    assert_eq!(r.count(ScenarioKind::Removed), 1);
    let removed = &r.appended[0];
    assert_eq!(removed.key, EntityKey(1));
    assert!(!removed.is_active);
    assert_eq!(removed.symbol, "BBB", "last known symbol carried forward");

    let active: Vec<EntityKey> = log
        .all_active_latest()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.key)
        .collect();
    assert_eq!(active, vec![EntityKey(2)]);

    // Still absent next cycle: no second removal.
    assert!(cycle(&dir, &log, 3).await.is_noop());
}

#[tokio::test]
async fn inactive_key_reappearing_unchanged_is_reinstated() {
    let dir = FakeDirectory::serving(vec![rec(1, "AAA", "Alpha"), rec(2, "B", "Beta")]);
    let log = MemoryEventLog::new();
    cycle(&dir, &log, 1).await;
    dir.set(vec![rec(2, "B", "Beta")]);
    cycle(&dir, &log, 2).await;

    dir.set(vec![rec(1, "AAA", "Alpha"), rec(2, "B", "Beta")]);
    let r = cycle(&dir, &log, 3).await;

    assert_eq!(r.appended.len(), 1);
    assert_eq!(r.appended[0].kind(), ScenarioKind::Reinstated);
    assert!(r.appended[0].is_active);
    let kinds: Vec<ScenarioKind> = log.history(EntityKey(1)).iter().map(Event::kind).collect();
    assert_eq!(
        kinds,
        vec![
            ScenarioKind::Baseline,
            ScenarioKind::Removed,
            ScenarioKind::Reinstated
        ]
    );
}

#[tokio::test]
async fn unchanged_snapshot_rerun_appends_nothing() {
    let dir = FakeDirectory::serving(vec![rec(1, "AAA", "Alpha"), rec(2, "BBB", "Beta")]);
    let log = MemoryEventLog::new();
    cycle(&dir, &log, 1).await;
    let before = log.len();

    for day in 2..5 {
        let r = cycle(&dir, &log, day).await;
        assert!(r.is_noop(), "day {day}: {}", r.summary());
    }
    assert_eq!(log.len(), before);
}

#[tokio::test]
async fn snapshot_failure_leaves_store_unchanged() {
    let dir = FakeDirectory::default();
    dir.fail();
    let log = MemoryEventLog::new();

    let err = run_cycle(&dir, &log, CycleOptions::at(t(1))).await.unwrap_err();
    assert!(matches!(err, CycleError::Snapshot(_)), "{err}");
    assert!(log.is_empty().await.unwrap(), "no partial baseline");
}

#[tokio::test]
async fn empty_snapshot_against_active_log_is_refused() {
    let dir = FakeDirectory::serving(vec![rec(1, "AAA", "Alpha")]);
    let log = MemoryEventLog::new();
    cycle(&dir, &log, 1).await;

    dir.set(vec![]);
    let err = run_cycle(&dir, &log, CycleOptions::at(t(2))).await.unwrap_err();
    assert!(matches!(err, CycleError::EmptySnapshot { active: 1 }), "{err}");
    assert_eq!(log.len(), 1);
}

#[tokio::test]
async fn empty_snapshot_on_empty_log_is_a_noop() {
    let dir = FakeDirectory::serving(vec![]);
    let log = MemoryEventLog::new();

    let r = cycle(&dir, &log, 1).await;
    assert!(r.first_cycle);
    assert!(r.is_noop());
    assert!(log.is_empty().await.unwrap());
}

#[tokio::test]
async fn replaying_a_cycle_timestamp_is_rejected_not_duplicated() {
    let dir = FakeDirectory::serving(vec![rec(1, "AAA", "Alpha")]);
    let log = MemoryEventLog::new();
    cycle(&dir, &log, 2).await;

    dir.set(vec![rec(1, "ZZZ", "Alpha")]);
    let err = run_cycle(&dir, &log, CycleOptions::at(t(2))).await.unwrap_err();
    assert!(matches!(err, CycleError::Store(LogError::OutOfOrder { .. })), "{err}");
    assert_eq!(log.history(EntityKey(1)).len(), 1);
}

#[tokio::test]
async fn revenue_resolved_per_key_and_fetch_failures_skipped() {
    let mut dir = FakeDirectory::serving(vec![rec(1, "AAA", "Alpha"), rec(2, "BBB", "Beta")]);
    dir.facts.insert(
        EntityKey(1),
        CompanyFacts::from_value(json!({ "facts": { "us-gaap": { "Revenues": { "units": { "USD": [
            { "end": "2023-12-31", "val": 100, "fp": "FY" },
            { "end": "2024-12-31", "val": 120, "fp": "FY" }
        ]}}}}}))
        .unwrap(),
    );
    let log = MemoryEventLog::new();
    let resolver = RevenueResolver::default();

    let r = run_cycle(&dir, &log, CycleOptions::at(t(1)).with_revenue(&resolver))
        .await
        .unwrap();

    assert_eq!(r.appended.len(), 2, "classification unaffected by facts failures");
    assert_eq!(r.revenues.len(), 1);
    assert_eq!(r.revenues[&EntityKey(1)].as_ref().unwrap().value, 120.0);
    assert_eq!(r.skipped.len(), 1);
    assert_eq!(r.skipped[0].key, EntityKey(2));
    assert!(r.skipped[0].reason.contains("404"));
}

#[tokio::test]
async fn projection_after_cycles_is_sorted_and_unique() {
    let dir = FakeDirectory::serving(vec![
        rec(30, "ZETA", "Zeta"),
        rec(10, "MID", "Mid"),
        rec(20, "ALFA", "Alfa"),
    ]);
    let log = MemoryEventLog::new();
    cycle(&dir, &log, 1).await;
    dir.set(vec![rec(30, "ZETA", "Zeta"), rec(10, "AAA", "Mid")]);
    cycle(&dir, &log, 2).await;

    let rows = project(&log).await.unwrap();
    let got: Vec<(&str, u64)> = rows.iter().map(|r| (r.symbol.as_str(), r.key.get())).collect();
    assert_eq!(got, vec![("AAA", 10), ("ZETA", 30)]);
    assert_eq!(rows[0].scenario_kind, ScenarioKind::SymbolChange);

    // Pure: repeatable with no side effects.
    assert_eq!(project(&log).await.unwrap(), rows);
}

#[tokio::test]
async fn apply_snapshot_without_directory_skips_revenue() {
    let log = MemoryEventLog::new();
    let resolver = RevenueResolver::default();
    let snap = Snapshot::from_records(vec![rec(1, "AAA", "Alpha")]);

    let r = apply_snapshot(&snap, &log, None, CycleOptions::at(t(1)).with_revenue(&resolver))
        .await
        .unwrap();
    assert_eq!(r.count(ScenarioKind::Baseline), 1);
    assert!(r.revenues.is_empty());
    assert!(r.skipped.is_empty());
}
