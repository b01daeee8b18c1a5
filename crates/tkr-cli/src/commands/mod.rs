//! Command handler modules for the `tkr` binary.
//!
//! Shared utilities used by multiple command paths live here.

pub mod export;
pub mod sync;

use anyhow::{Context, Result};
use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use std::io;
use std::path::Path;
use std::time::Duration;
use tkr_config::{report_unused_keys, LoadedConfig, RegistryConfig, UnusedKeyPolicy};
use tkr_edgar::budget::{DEFAULT_INTERVAL, DEFAULT_REQUESTS_PER_INTERVAL};
use tkr_edgar::{EdgarClient, RequestBudget, DEFAULT_DATA_BASE_URL, DEFAULT_DIRECTORY_URL};
use tracing::warn;

/// Load layered config, warn about unused keys, extract the typed view.
pub fn load_config(paths: &[String]) -> Result<(LoadedConfig, RegistryConfig)> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = tkr_config::load_layered_yaml(&path_refs)?;

    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for p in &report.unused_leaf_pointers {
        warn!(pointer = %p, "unused config key");
    }

    let cfg = loaded.registry()?;
    Ok((loaded, cfg))
}

/// Like [`load_config`], but no paths means an all-default config.
pub fn load_optional_config(paths: &[String]) -> Result<RegistryConfig> {
    if paths.is_empty() {
        return Ok(RegistryConfig::default());
    }
    Ok(load_config(paths)?.1)
}

pub fn build_client(cfg: &RegistryConfig) -> Result<EdgarClient> {
    let user_agent = cfg.require_user_agent()?.to_string();
    let directory_url = cfg
        .edgar
        .directory_url
        .clone()
        .unwrap_or_else(|| DEFAULT_DIRECTORY_URL.to_string());
    let data_base_url = cfg
        .edgar
        .data_base_url
        .clone()
        .unwrap_or_else(|| DEFAULT_DATA_BASE_URL.to_string());
    let budget = RequestBudget::new(
        cfg.edgar
            .requests_per_interval
            .unwrap_or(DEFAULT_REQUESTS_PER_INTERVAL),
        cfg.edgar
            .interval_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_INTERVAL),
    );

    Ok(EdgarClient::new_with_base_url(user_agent, directory_url, data_base_url).with_budget(budget))
}

/// Cycle timestamp at the store's resolution (microseconds).
pub fn cycle_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Write rows as CSV (header from field names) to `path`, or stdout.
pub fn write_csv<T: Serialize>(path: Option<&Path>, rows: &[T]) -> Result<()> {
    match path {
        Some(p) => {
            if let Some(dir) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("create export dir failed: {}", dir.display()))?;
            }
            let mut w = csv::Writer::from_path(p)
                .with_context(|| format!("open csv failed: {}", p.display()))?;
            for r in rows {
                w.serialize(r).context("csv serialize failed")?;
            }
            w.flush().context("csv flush failed")?;
        }
        None => {
            let mut w = csv::Writer::from_writer(io::stdout());
            for r in rows {
                w.serialize(r).context("csv serialize failed")?;
            }
            w.flush().context("csv flush failed")?;
        }
    }
    Ok(())
}
