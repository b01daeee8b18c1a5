//! Reconciliation driver: one cycle = snapshot -> classified events -> sweep.
//!
//! Ordering within a cycle:
//! 1. fetch the snapshot (failure aborts, store untouched)
//! 2. note whether the log is empty (decides BASELINE vs NEW_ENTRY)
//! 3. per key, ascending: read latest, classify, append; optionally resolve revenue
//! 4. removal sweep against the active set as it stands after step 3
//!
//! A single `observed_at` stamps every event of the cycle, so a key receives
//! at most one event per cycle and replaying the same cycle is rejected by
//! the store's ordering check rather than duplicated.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use tkr_revenue::{RevenueFact, RevenueResolver};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    classify, sweep, Directory, DirectoryError, EntityKey, Event, EventLog, LogError,
    ScenarioKind, Snapshot,
};

/// Per-cycle inputs.
#[derive(Clone, Copy, Debug)]
pub struct CycleOptions<'a> {
    /// Timestamp stamped on every event appended by this cycle.
    pub observed_at: DateTime<Utc>,
    /// When set, facts are fetched and resolved for every incoming key.
    pub revenue: Option<&'a RevenueResolver>,
}

impl<'a> CycleOptions<'a> {
    pub fn at(observed_at: DateTime<Utc>) -> Self {
        Self {
            observed_at,
            revenue: None,
        }
    }

    pub fn with_revenue(mut self, resolver: &'a RevenueResolver) -> Self {
        self.revenue = Some(resolver);
        self
    }
}

/// Entity whose per-entity work was skipped this cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedEntity {
    pub key: EntityKey,
    pub reason: String,
}

/// Outcome of one cycle.
#[derive(Clone, Debug)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub observed_at: DateTime<Utc>,
    /// Log was empty when the cycle started.
    pub first_cycle: bool,
    pub incoming: usize,
    pub collapsed_duplicates: usize,
    /// Events appended, classification events first, then removals.
    pub appended: Vec<Event>,
    /// Resolved revenue per key (`None` = no candidate yielded a value).
    pub revenues: BTreeMap<EntityKey, Option<RevenueFact>>,
    pub skipped: Vec<SkippedEntity>,
}

impl CycleReport {
    fn new(observed_at: DateTime<Utc>) -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            observed_at,
            first_cycle: false,
            incoming: 0,
            collapsed_duplicates: 0,
            appended: Vec::new(),
            revenues: BTreeMap::new(),
            skipped: Vec::new(),
        }
    }

    pub fn count(&self, kind: ScenarioKind) -> usize {
        self.appended.iter().filter(|e| e.kind() == kind).count()
    }

    /// Nothing was appended.
    pub fn is_noop(&self) -> bool {
        self.appended.is_empty()
    }

    /// `KIND=n` pairs for every kind with at least one event, in kind order.
    pub fn summary(&self) -> String {
        let parts: Vec<String> = ScenarioKind::ALL
            .iter()
            .filter_map(|k| match self.count(*k) {
                0 => None,
                n => Some(format!("{}={}", k.as_str(), n)),
            })
            .collect();
        if parts.is_empty() {
            "no_changes".to_string()
        } else {
            parts.join(" ")
        }
    }
}

/// Cycle failure. Either way, appends made before the failure stay durable.
#[derive(Debug)]
pub enum CycleError {
    /// Top-level snapshot could not be fetched; nothing was written.
    Snapshot(DirectoryError),
    /// Snapshot came back empty while the log holds active entities.
    /// Treated as an upstream failure rather than a mass removal.
    EmptySnapshot { active: usize },
    /// Store read or append failed.
    Store(LogError),
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleError::Snapshot(e) => write!(f, "directory snapshot unavailable: {e}"),
            CycleError::EmptySnapshot { active } => write!(
                f,
                "directory snapshot is empty but {active} entities are active; refusing to sweep"
            ),
            CycleError::Store(e) => write!(f, "event log failure: {e}"),
        }
    }
}

impl std::error::Error for CycleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CycleError::Snapshot(e) => Some(e),
            CycleError::Store(e) => Some(e),
            CycleError::EmptySnapshot { .. } => None,
        }
    }
}

impl From<LogError> for CycleError {
    fn from(e: LogError) -> Self {
        CycleError::Store(e)
    }
}

/// Run one full cycle against `directory`.
pub async fn run_cycle(
    directory: &dyn Directory,
    log: &dyn EventLog,
    opts: CycleOptions<'_>,
) -> Result<CycleReport, CycleError> {
    let snapshot = match directory.fetch_snapshot().await {
        Ok(s) => s,
        Err(e) => {
            warn!(directory = directory.name(), error = %e, "snapshot fetch failed; cycle aborted");
            return Err(CycleError::Snapshot(e));
        }
    };
    apply_snapshot(&snapshot, log, Some(directory), opts).await
}

/// Reconcile an already-fetched snapshot.
///
/// `directory` is only consulted for per-entity facts when
/// `opts.revenue` is set; pass `None` to classify without any fetches.
pub async fn apply_snapshot(
    snapshot: &Snapshot,
    log: &dyn EventLog,
    directory: Option<&dyn Directory>,
    opts: CycleOptions<'_>,
) -> Result<CycleReport, CycleError> {
    let mut report = CycleReport::new(opts.observed_at);
    report.incoming = snapshot.len();
    report.collapsed_duplicates = snapshot.collapsed();
    report.first_cycle = log.is_empty().await?;

    if snapshot.is_empty() && !report.first_cycle {
        let active = log.all_active_latest().await?.len();
        if active > 0 {
            return Err(CycleError::EmptySnapshot { active });
        }
    }

    info!(
        cycle_id = %report.cycle_id,
        incoming = report.incoming,
        collapsed = report.collapsed_duplicates,
        first_cycle = report.first_cycle,
        "reconcile cycle start"
    );

    for record in snapshot.iter() {
        let latest = log.latest_for(record.key).await?;
        if let Some(scenario) = classify(latest.as_ref(), record, report.first_cycle) {
            let ev = Event::from_record(record, scenario, opts.observed_at);
            log.append(&ev).await?;
            debug!(key = %ev.key, symbol = %ev.symbol, kind = %ev.kind(), "event appended");
            report.appended.push(ev);
        }

        if let (Some(resolver), Some(dir)) = (opts.revenue, directory) {
            match dir.fetch_facts(record.key).await {
                Ok(facts) => {
                    report.revenues.insert(record.key, resolver.resolve(&facts));
                }
                Err(e) => {
                    warn!(key = %record.key, symbol = %record.symbol, error = %e, "facts fetch failed; skipped");
                    report.skipped.push(SkippedEntity {
                        key: record.key,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    let active = log.all_active_latest().await?;
    for ev in sweep(&snapshot.keys(), &active, opts.observed_at) {
        log.append(&ev).await?;
        debug!(key = %ev.key, symbol = %ev.symbol, "removal appended");
        report.appended.push(ev);
    }

    info!(
        cycle_id = %report.cycle_id,
        appended = report.appended.len(),
        skipped = report.skipped.len(),
        summary = %report.summary(),
        "reconcile cycle done"
    );
    Ok(report)
}
