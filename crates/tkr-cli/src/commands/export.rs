//! Read-only exports from the stored log.

use anyhow::Result;
use std::path::PathBuf;
use tkr_db::PgEventLog;
use tracing::info;

use super::{load_optional_config, write_csv};

pub async fn run_project(config_paths: &[String], csv: Option<PathBuf>) -> Result<()> {
    let cfg = load_optional_config(config_paths)?;
    let out = csv.or(cfg.export.projection_csv);

    let pool = tkr_db::connect_from_env().await?;
    let rows = tkr_registry::project(&PgEventLog::new(pool)).await?;

    write_csv(out.as_deref(), &rows)?;
    if let Some(p) = &out {
        info!(rows = rows.len(), path = %p.display(), "projection exported");
        println!("rows={} path={}", rows.len(), p.display());
    }
    Ok(())
}

pub async fn run_export_profiles(config_paths: &[String], csv: Option<PathBuf>) -> Result<()> {
    let cfg = load_optional_config(config_paths)?;
    let out = csv.or(cfg.export.profiles_csv);

    let pool = tkr_db::connect_from_env().await?;
    let rows = tkr_db::fetch_profiles_by_revenue(&pool).await?;

    write_csv(out.as_deref(), &rows)?;
    if let Some(p) = &out {
        info!(rows = rows.len(), path = %p.display(), "profiles exported");
        println!("rows={} path={}", rows.len(), p.display());
    }
    Ok(())
}
