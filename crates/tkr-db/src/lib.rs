use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;

mod events;
mod profiles;

pub use events::{load_events, PgEventLog};
pub use sqlx::PgPool;

pub use profiles::{fetch_profiles_by_revenue, record_revenue, upsert_profile, ProfileRow, ProfileUpsert};

pub const ENV_DB_URL: &str = "TKR_DATABASE_URL";

/// Connect to Postgres using TKR_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL)
        .with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Connectivity + schema presence + event count.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;
    let ok = one == 1;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='registry_events'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    let event_count = if exists {
        let (n,): (i64,) = sqlx::query_as::<_, (i64,)>("select count(*)::bigint from registry_events")
            .fetch_one(pool)
            .await
            .context("status event count failed")?;
        n
    } else {
        0
    };

    Ok(DbStatus {
        ok,
        has_events_table: exists,
        event_count,
    })
}

#[derive(Debug, Clone, Copy)]
pub struct DbStatus {
    pub ok: bool,
    pub has_events_table: bool,
    pub event_count: i64,
}
