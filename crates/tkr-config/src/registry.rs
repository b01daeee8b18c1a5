//! Typed view over the merged config.
//!
//! Every section and key is optional; absent values take the defaults below
//! or are left to the consumer (`None`). Type mismatches are errors.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tkr_revenue::RevenueResolver;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub edgar: EdgarSettings,
    pub reconcile: ReconcileSettings,
    pub revenue: RevenueSettings,
    pub export: ExportSettings,
}

/// Upstream endpoints and pacing. `None` means the client's built-in default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EdgarSettings {
    /// Operator identity sent as User-Agent, e.g. `"Jane Doe jane@example.com"`.
    pub user_agent: Option<String>,
    pub directory_url: Option<String>,
    pub data_base_url: Option<String>,
    pub requests_per_interval: Option<u32>,
    pub interval_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReconcileSettings {
    /// Fetch facts and resolve revenue for every incoming key during `sync`.
    pub resolve_revenue: bool,
    /// Refresh submissions-derived profiles during `enrich`.
    pub refresh_profiles: bool,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            resolve_revenue: false,
            refresh_profiles: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RevenueSettings {
    /// `namespace:tag` entries, highest priority first. Absent = built-in waterfall.
    pub waterfall: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub projection_csv: Option<PathBuf>,
    pub profiles_csv: Option<PathBuf>,
}

impl RegistryConfig {
    pub fn from_json(v: &Value) -> Result<Self> {
        let cfg: RegistryConfig =
            serde_json::from_value(v.clone()).context("config does not match registry schema")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if let Some(ua) = &self.edgar.user_agent {
            if !ua.contains('@') {
                bail!("CONFIG_INVALID /edgar/user_agent must include a contact email");
            }
        }
        if self.edgar.requests_per_interval == Some(0) {
            bail!("CONFIG_INVALID /edgar/requests_per_interval must be >= 1");
        }
        if self.edgar.interval_ms == Some(0) {
            bail!("CONFIG_INVALID /edgar/interval_ms must be >= 1");
        }
        // Parse now so a bad entry fails at load, not mid-cycle.
        self.revenue_resolver()?;
        Ok(())
    }

    /// User-Agent for upstream requests; required by every networked command.
    pub fn require_user_agent(&self) -> Result<&str> {
        self.edgar
            .user_agent
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .context("CONFIG_MISSING /edgar/user_agent")
    }

    pub fn revenue_resolver(&self) -> Result<RevenueResolver> {
        match &self.revenue.waterfall {
            None => Ok(RevenueResolver::default()),
            Some(list) if list.is_empty() => {
                bail!("CONFIG_INVALID /revenue/waterfall is empty; omit it to use the default")
            }
            Some(list) => RevenueResolver::from_specs(list).context("CONFIG_INVALID /revenue/waterfall"),
        }
    }
}
