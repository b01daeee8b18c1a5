//! tkr-registry
//!
//! Registry reconciliation engine.
//!
//! Architectural decisions:
//! - The event log is append-only; corrections are new events, never edits
//! - Latest state per key = event with the greatest `observed_at`
//! - One classified event per key per cycle, chosen by an explicit ordered rule table
//! - First-ever cycle (empty log) seeds BASELINE events instead of NEW_ENTRY
//! - Removal sweep runs after every key of the snapshot has been classified
//! - The store is always passed in explicitly (`&dyn EventLog`); no ambient state
//!
//! Classification, sweep and projection are pure. IO is confined to the
//! [`Directory`] and [`EventLog`] seams, both supplied by the caller.

mod classify;
mod directory;
mod driver;
mod feed;
mod log;
mod projector;
mod sweep;
mod types;

pub use classify::{classify, Rule, Transition, CLASSIFICATION_RULES};
pub use directory::{Directory, DirectoryError};
pub use driver::{
    apply_snapshot, run_cycle, CycleError, CycleOptions, CycleReport, SkippedEntity,
};
pub use feed::{match_feed_signals, FeedMatch, FeedSignal};
pub use log::{check_consistent, EventLog, LogError, MemoryEventLog};
pub use projector::{project, project_events, ProjectionRow};
pub use sweep::sweep;
pub use types::*;
