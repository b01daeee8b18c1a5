//! Postgres-backed [`EventLog`].
//!
//! Ordering is enforced per key inside one transaction that holds a
//! transaction-scoped advisory lock on the key, so a concurrent writer for
//! the same key waits, then sees the fresh latest row and is rejected.

use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tkr_registry::{check_consistent, EntityKey, Event, EventLog, LogError, Scenario, ScenarioKind};
use tracing::debug;

const EVENT_COLUMNS: &str =
    "entity_key, symbol, display_name, scenario_kind, detail_from, detail_to, is_active, observed_at";

#[derive(Debug, Clone)]
pub struct PgEventLog {
    pool: PgPool,
}

impl PgEventLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn backend(e: impl std::fmt::Display) -> LogError {
    LogError::Backend(e.to_string())
}

fn key_to_db(key: EntityKey) -> Result<i64, LogError> {
    i64::try_from(key.get()).map_err(|_| LogError::Backend(format!("entity key {key} exceeds bigint")))
}

fn event_from_row(row: &PgRow) -> Result<Event, LogError> {
    let key: i64 = row.try_get("entity_key").map_err(backend)?;
    let kind_s: String = row.try_get("scenario_kind").map_err(backend)?;
    let kind = ScenarioKind::parse(&kind_s)
        .ok_or_else(|| LogError::Backend(format!("unknown scenario_kind '{kind_s}'")))?;
    let from: Option<String> = row.try_get("detail_from").map_err(backend)?;
    let to: Option<String> = row.try_get("detail_to").map_err(backend)?;
    let scenario = Scenario::from_parts(kind, from, to)
        .ok_or_else(|| LogError::Backend(format!("inconsistent detail for {kind_s} at key {key}")))?;

    Ok(Event {
        key: EntityKey(u64::try_from(key).map_err(backend)?),
        symbol: row.try_get("symbol").map_err(backend)?,
        display_name: row.try_get("display_name").map_err(backend)?,
        scenario,
        is_active: row.try_get("is_active").map_err(backend)?,
        observed_at: row.try_get("observed_at").map_err(backend)?,
    })
}

#[async_trait::async_trait]
impl EventLog for PgEventLog {
    async fn append(&self, event: &Event) -> Result<(), LogError> {
        check_consistent(event)?;
        let key = key_to_db(event.key)?;
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query("select pg_advisory_xact_lock($1)")
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        let latest = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "select max(observed_at) from registry_events where entity_key = $1",
        )
        .bind(key)
        .fetch_one(&mut *tx)
        .await
        .map_err(backend)?;

        if let Some(latest) = latest {
            if event.observed_at <= latest {
                // tx drops here and rolls back
                return Err(LogError::OutOfOrder {
                    key: event.key,
                    latest,
                    got: event.observed_at,
                });
            }
        }

        let (from, to) = match event.scenario.detail() {
            Some((f, t)) => (Some(f), Some(t)),
            None => (None, None),
        };

        sqlx::query(
            r#"
            insert into registry_events (
              entity_key, symbol, display_name, scenario_kind, detail_from, detail_to,
              is_active, observed_at
            ) values (
              $1, $2, $3, $4, $5, $6, $7, $8
            )
            "#,
        )
        .bind(key)
        .bind(&event.symbol)
        .bind(&event.display_name)
        .bind(event.kind().as_str())
        .bind(from)
        .bind(to)
        .bind(event.is_active)
        .bind(event.observed_at)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        debug!(key = %event.key, kind = %event.kind(), "registry event persisted");
        Ok(())
    }

    async fn latest_for(&self, key: EntityKey) -> Result<Option<Event>, LogError> {
        let row = sqlx::query(&format!(
            "select {EVENT_COLUMNS} from registry_events where entity_key = $1 \
             order by observed_at desc limit 1"
        ))
        .bind(key_to_db(key)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.as_ref().map(event_from_row).transpose()
    }

    async fn all_active_latest(&self) -> Result<Vec<Event>, LogError> {
        let rows = sqlx::query(&format!(
            r#"
            select {EVENT_COLUMNS} from (
              select distinct on (entity_key) {EVENT_COLUMNS}
              from registry_events
              order by entity_key, observed_at desc
            ) latest
            where is_active
            order by entity_key
            "#
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(event_from_row).collect()
    }

    async fn is_empty(&self) -> Result<bool, LogError> {
        let (exists,): (bool,) =
            sqlx::query_as::<_, (bool,)>("select exists (select 1 from registry_events)")
                .fetch_one(&self.pool)
                .await
                .map_err(backend)?;
        Ok(!exists)
    }
}

/// Full history in `(entity_key, observed_at)` order. Used to seed an
/// in-memory log for dry runs.
pub async fn load_events(pool: &PgPool) -> anyhow::Result<Vec<Event>> {
    let rows = sqlx::query(&format!(
        "select {EVENT_COLUMNS} from registry_events order by entity_key, observed_at"
    ))
    .fetch_all(pool)
    .await
    .context("load_events failed")?;

    rows.iter()
        .map(|r| event_from_row(r).map_err(anyhow::Error::from))
        .collect()
}
