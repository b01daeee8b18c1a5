//! DB-backed tests, skipped if TKR_DATABASE_URL is not set.
//!
//! Rows cannot be deleted (append-only trigger), so every test works on a
//! freshly drawn key range.

use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::PgPool;
use tkr_db::{PgEventLog, ProfileUpsert};
use tkr_registry::{
    project, EntityKey, Event, EventLog, LogError, Scenario, ScenarioKind, SnapshotRecord,
};

async fn pool_or_skip() -> anyhow::Result<Option<PgPool>> {
    let url = match std::env::var(tkr_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: TKR_DATABASE_URL not set");
            return Ok(None);
        }
    };
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await?;
    tkr_db::migrate(&pool).await?;
    Ok(Some(pool))
}

fn fresh_key() -> u64 {
    // Above any real CIK, below i64::MAX.
    9_000_000_000 + (uuid::Uuid::new_v4().as_u128() % 1_000_000_000_000) as u64
}

fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn ev(key: u64, symbol: &str, scenario: Scenario, minutes: i64) -> Event {
    Event::from_record(&SnapshotRecord::new(key, symbol, "Test Co"), scenario, at(minutes))
}

#[tokio::test]
async fn migrate_twice_is_idempotent() -> anyhow::Result<()> {
    let Some(pool) = pool_or_skip().await? else {
        return Ok(());
    };
    tkr_db::migrate(&pool).await?;
    let st = tkr_db::status(&pool).await?;
    assert!(st.ok);
    assert!(st.has_events_table);
    Ok(())
}

#[tokio::test]
async fn append_then_latest_round_trips_scenario_detail() -> anyhow::Result<()> {
    let Some(pool) = pool_or_skip().await? else {
        return Ok(());
    };
    let log = PgEventLog::new(pool);
    let k = fresh_key();

    log.append(&ev(k, "AAA", Scenario::NewEntry, 0)).await?;
    let change = ev(
        k,
        "BBB",
        Scenario::SymbolChange {
            from: "AAA".into(),
            to: "BBB".into(),
        },
        1,
    );
    log.append(&change).await?;

    let latest = log.latest_for(EntityKey(k)).await?.expect("latest");
    assert_eq!(latest, change);
    Ok(())
}

#[tokio::test]
async fn non_increasing_timestamp_is_rejected() -> anyhow::Result<()> {
    let Some(pool) = pool_or_skip().await? else {
        return Ok(());
    };
    let log = PgEventLog::new(pool);
    let k = fresh_key();

    log.append(&ev(k, "AAA", Scenario::NewEntry, 10)).await?;
    let err = log
        .append(&ev(k, "AAA", Scenario::Reinstated, 10))
        .await
        .unwrap_err();
    assert!(matches!(err, LogError::OutOfOrder { .. }), "{err}");
    let err = log
        .append(&ev(k, "AAA", Scenario::Reinstated, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, LogError::OutOfOrder { .. }), "{err}");
    Ok(())
}

#[tokio::test]
async fn concurrent_appends_for_one_key_admit_exactly_one() -> anyhow::Result<()> {
    let Some(pool) = pool_or_skip().await? else {
        return Ok(());
    };
    let log = PgEventLog::new(pool);
    let k = fresh_key();
    log.append(&ev(k, "AAA", Scenario::NewEntry, 0)).await?;

    let a = ev(k, "AAA", Scenario::Removed, 1);
    let b = ev(k, "AAA", Scenario::Removed, 1);
    let (ra, rb) = tokio::join!(log.append(&a), log.append(&b));
    assert_eq!(
        [ra.is_ok(), rb.is_ok()].iter().filter(|ok| **ok).count(),
        1,
        "exactly one writer wins: {ra:?} {rb:?}"
    );
    Ok(())
}

#[tokio::test]
async fn removed_key_drops_out_of_active_latest() -> anyhow::Result<()> {
    let Some(pool) = pool_or_skip().await? else {
        return Ok(());
    };
    let log = PgEventLog::new(pool);
    let k = fresh_key();

    let first = ev(k, "GONE", Scenario::NewEntry, 0);
    log.append(&first).await?;
    log.append(&Event::removal_of(&first, at(1))).await?;

    let active = log.all_active_latest().await?;
    assert!(active.iter().all(|e| e.key != EntityKey(k)));
    assert!(!log.is_empty().await?);

    let latest = log.latest_for(EntityKey(k)).await?.expect("latest");
    assert_eq!(latest.kind(), ScenarioKind::Removed);
    assert!(!latest.is_active);
    Ok(())
}

#[tokio::test]
async fn profiles_export_orders_by_revenue() -> anyhow::Result<()> {
    let Some(pool) = pool_or_skip().await? else {
        return Ok(());
    };
    let log = PgEventLog::new(pool.clone());
    let small = fresh_key();
    let big = fresh_key();
    log.append(&ev(small, "SMOL", Scenario::NewEntry, 0)).await?;
    log.append(&ev(big, "HUGE", Scenario::NewEntry, 0)).await?;

    tkr_db::upsert_profile(
        &pool,
        &ProfileUpsert {
            key: EntityKey(big),
            industry: Some("Widgets".into()),
            location: Some("Austin, TX".into()),
            annual_report_date: None,
            annual_report_url: None,
            updated_at: at(5),
        },
    )
    .await?;

    let mk = |v: f64| tkr_revenue::RevenueFact {
        value: v,
        source: tkr_revenue::TagCandidate::new("us-gaap", "Revenues"),
        unit: "USD".into(),
        end: chrono::NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        fiscal_period: Some("FY".into()),
    };
    tkr_db::record_revenue(&pool, EntityKey(small), Some(&mk(1.0)), at(6)).await?;
    tkr_db::record_revenue(&pool, EntityKey(big), Some(&mk(9e15)), at(6)).await?;

    let rows = tkr_db::fetch_profiles_by_revenue(&pool).await?;
    let pos = |k: u64| rows.iter().position(|r| r.key == EntityKey(k)).expect("row");
    assert!(pos(big) < pos(small));

    let huge = &rows[pos(big)];
    assert_eq!(huge.industry.as_deref(), Some("Widgets"));
    assert_eq!(huge.revenue_tag.as_deref(), Some("us-gaap:Revenues"));
    Ok(())
}

#[tokio::test]
async fn projection_over_pg_matches_latest_state() -> anyhow::Result<()> {
    let Some(pool) = pool_or_skip().await? else {
        return Ok(());
    };
    let log = PgEventLog::new(pool);
    let k = fresh_key();
    log.append(&ev(k, "PRJA", Scenario::NewEntry, 0)).await?;
    log.append(&ev(
        k,
        "PRJB",
        Scenario::SymbolChange {
            from: "PRJA".into(),
            to: "PRJB".into(),
        },
        1,
    ))
    .await?;

    let rows = project(&log).await?;
    let mine: Vec<_> = rows.iter().filter(|r| r.key == EntityKey(k)).collect();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].symbol, "PRJB");
    assert_eq!(mine[0].scenario_detail, "PRJA → PRJB");
    Ok(())
}
