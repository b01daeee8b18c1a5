//! Per-entity enrichment rows and the revenue-ordered export query.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{PgPool, Row};
use tkr_registry::EntityKey;
use tkr_revenue::RevenueFact;

fn key_to_db(key: EntityKey) -> Result<i64> {
    i64::try_from(key.get()).with_context(|| format!("entity key {key} exceeds bigint"))
}

/// Filer metadata to store for one key.
#[derive(Debug, Clone)]
pub struct ProfileUpsert {
    pub key: EntityKey,
    pub industry: Option<String>,
    pub location: Option<String>,
    pub annual_report_date: Option<NaiveDate>,
    pub annual_report_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Insert or refresh the metadata half of a profile. Revenue columns are untouched.
pub async fn upsert_profile(pool: &PgPool, p: &ProfileUpsert) -> Result<()> {
    sqlx::query(
        r#"
        insert into entity_profiles (
          entity_key, industry, location, annual_report_date, annual_report_url, profile_updated_at
        ) values (
          $1, $2, $3, $4, $5, $6
        )
        on conflict (entity_key) do update set
          industry = excluded.industry,
          location = excluded.location,
          annual_report_date = excluded.annual_report_date,
          annual_report_url = excluded.annual_report_url,
          profile_updated_at = excluded.profile_updated_at
        "#,
    )
    .bind(key_to_db(p.key)?)
    .bind(&p.industry)
    .bind(&p.location)
    .bind(p.annual_report_date)
    .bind(&p.annual_report_url)
    .bind(p.updated_at)
    .execute(pool)
    .await
    .context("upsert_profile failed")?;

    Ok(())
}

/// Store the resolved revenue of one key. `None` clears a previous value:
/// the latest resolution is authoritative.
pub async fn record_revenue(
    pool: &PgPool,
    key: EntityKey,
    fact: Option<&RevenueFact>,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        insert into entity_profiles (
          entity_key, revenue, revenue_tag, revenue_unit, revenue_period_end, revenue_updated_at
        ) values (
          $1, $2, $3, $4, $5, $6
        )
        on conflict (entity_key) do update set
          revenue = excluded.revenue,
          revenue_tag = excluded.revenue_tag,
          revenue_unit = excluded.revenue_unit,
          revenue_period_end = excluded.revenue_period_end,
          revenue_updated_at = excluded.revenue_updated_at
        "#,
    )
    .bind(key_to_db(key)?)
    .bind(fact.map(|f| f.value))
    .bind(fact.map(|f| f.source.to_string()))
    .bind(fact.map(|f| f.unit.clone()))
    .bind(fact.map(|f| f.end))
    .bind(at)
    .execute(pool)
    .await
    .context("record_revenue failed")?;

    Ok(())
}

/// One export row: an active entity with whatever enrichment is known.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileRow {
    pub symbol: String,
    pub key: EntityKey,
    pub name: String,
    pub industry: Option<String>,
    pub location: Option<String>,
    pub annual_report_date: Option<NaiveDate>,
    pub annual_report_url: Option<String>,
    pub revenue: Option<f64>,
    pub revenue_tag: Option<String>,
}

/// Active entities (latest event active) joined with their profiles,
/// highest revenue first; unknown revenue last, then by symbol and key.
pub async fn fetch_profiles_by_revenue(pool: &PgPool) -> Result<Vec<ProfileRow>> {
    let rows = sqlx::query(
        r#"
        with latest as (
          select distinct on (entity_key) entity_key, symbol, display_name, is_active
          from registry_events
          order by entity_key, observed_at desc
        )
        select
          l.entity_key,
          l.symbol,
          l.display_name,
          p.industry,
          p.location,
          p.annual_report_date,
          p.annual_report_url,
          p.revenue,
          p.revenue_tag
        from latest l
        left join entity_profiles p on p.entity_key = l.entity_key
        where l.is_active
        order by p.revenue desc nulls last, l.symbol, l.entity_key
        "#,
    )
    .fetch_all(pool)
    .await
    .context("fetch_profiles_by_revenue failed")?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let key: i64 = row.try_get("entity_key")?;
        out.push(ProfileRow {
            symbol: row.try_get("symbol")?,
            key: EntityKey(u64::try_from(key).context("negative entity_key")?),
            name: row.try_get("display_name")?,
            industry: row.try_get("industry")?,
            location: row.try_get("location")?,
            annual_report_date: row.try_get("annual_report_date")?,
            annual_report_url: row.try_get("annual_report_url")?,
            revenue: row.try_get("revenue")?,
            revenue_tag: row.try_get("revenue_tag")?,
        });
    }
    Ok(out)
}
