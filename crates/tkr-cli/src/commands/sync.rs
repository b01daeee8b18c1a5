//! Networked commands: one reconciliation cycle, bulk enrichment, feed-driven refresh.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;
use tkr_db::{DbStatus, PgEventLog, PgPool, ProfileUpsert};
use tkr_edgar::EdgarClient;
use tkr_registry::{
    match_feed_signals, run_cycle, CycleOptions, CycleReport, Directory, EntityKey, EventLog,
    MemoryEventLog,
};
use tkr_revenue::RevenueResolver;
use tracing::{info, warn};

use super::{build_client, cycle_timestamp, load_config};

pub async fn run_sync(config_paths: &[String], dry_run: bool) -> Result<()> {
    let (loaded, cfg) = load_config(config_paths)?;
    let client = build_client(&cfg)?;
    let resolver = cfg.revenue_resolver()?;
    let pool = tkr_db::connect_from_env().await?;
    if dry_run {
        require_events_table(&tkr_db::status(&pool).await?)?;
    } else {
        tkr_db::migrate(&pool).await?;
    }

    let observed_at = cycle_timestamp();
    let mut opts = CycleOptions::at(observed_at);
    if cfg.reconcile.resolve_revenue {
        opts = opts.with_revenue(&resolver);
    }
    info!(config_hash = %loaded.config_hash, dry_run, "sync start");

    let report = if dry_run {
        let log = MemoryEventLog::from_events(tkr_db::load_events(&pool).await?)?;
        run_cycle(&client, &log, opts).await?
    } else {
        let log = PgEventLog::new(pool.clone());
        run_cycle(&client, &log, opts).await?
    };

    if !dry_run {
        for (key, fact) in &report.revenues {
            tkr_db::record_revenue(&pool, *key, fact.as_ref(), observed_at).await?;
        }
    }

    print_report(&report, dry_run);
    Ok(())
}

/// Dry runs issue no DDL, so the schema must already exist.
fn require_events_table(status: &DbStatus) -> Result<()> {
    if !status.has_events_table {
        bail!("registry_events table missing; run `tkr db migrate` before a dry run");
    }
    Ok(())
}

fn print_report(report: &CycleReport, dry_run: bool) {
    println!(
        "cycle_id={} observed_at={} dry_run={} first_cycle={} incoming={} collapsed={} appended={} skipped={}",
        report.cycle_id,
        report.observed_at.to_rfc3339(),
        dry_run,
        report.first_cycle,
        report.incoming,
        report.collapsed_duplicates,
        report.appended.len(),
        report.skipped.len()
    );
    println!("summary={}", report.summary());
    for ev in &report.appended {
        println!(
            "event key={} symbol={} kind={} detail={}",
            ev.key,
            ev.symbol,
            ev.kind(),
            ev.scenario.detail_text()
        );
    }
    for (key, fact) in &report.revenues {
        match fact {
            Some(f) => println!(
                "revenue key={} value={} unit={} tag={} end={}",
                key, f.value, f.unit, f.source, f.end
            ),
            None => println!("revenue key={} value=NONE", key),
        }
    }
    for s in &report.skipped {
        println!("skipped key={} reason={}", s.key, s.reason);
    }
}

#[derive(Debug, Default)]
struct EnrichTally {
    refreshed: usize,
    skipped: usize,
}

struct Enricher<'a> {
    client: &'a EdgarClient,
    pool: &'a PgPool,
    resolver: &'a RevenueResolver,
    refresh_profiles: bool,
    at: DateTime<Utc>,
}

impl Enricher<'_> {
    async fn refresh(&self, key: EntityKey, tally: &mut EnrichTally) -> Result<()> {
        if self.refresh_profiles {
            match self.client.fetch_submissions(key).await {
                Ok(p) => {
                    let upsert = ProfileUpsert {
                        key,
                        industry: p.industry,
                        location: p.location,
                        annual_report_date: p.latest_annual_report.as_ref().and_then(|r| r.report_date),
                        annual_report_url: p.latest_annual_report.map(|r| r.url),
                        updated_at: self.at,
                    };
                    tkr_db::upsert_profile(self.pool, &upsert).await?;
                }
                Err(e) => {
                    warn!(%key, error = %e, "submissions fetch failed; skipped");
                    tally.skipped += 1;
                    return Ok(());
                }
            }
        }

        match self.client.fetch_facts(key).await {
            Ok(facts) => {
                let fact = self.resolver.resolve(&facts);
                tkr_db::record_revenue(self.pool, key, fact.as_ref(), self.at).await?;
                tally.refreshed += 1;
            }
            Err(e) => {
                warn!(%key, error = %e, "facts fetch failed; skipped");
                tally.skipped += 1;
            }
        }
        Ok(())
    }
}

pub async fn run_enrich(config_paths: &[String]) -> Result<()> {
    let (_loaded, cfg) = load_config(config_paths)?;
    let client = build_client(&cfg)?;
    let resolver = cfg.revenue_resolver()?;
    let pool = tkr_db::connect_from_env().await?;

    let active = PgEventLog::new(pool.clone()).all_active_latest().await?;
    info!(active = active.len(), "enrich start");

    let enricher = Enricher {
        client: &client,
        pool: &pool,
        resolver: &resolver,
        refresh_profiles: cfg.reconcile.refresh_profiles,
        at: cycle_timestamp(),
    };
    let mut tally = EnrichTally::default();
    for ev in &active {
        enricher.refresh(ev.key, &mut tally).await?;
    }

    println!(
        "active={} refreshed={} skipped={}",
        active.len(),
        tally.refreshed,
        tally.skipped
    );
    Ok(())
}

pub async fn run_feed(config_paths: &[String], titles: &Path, dry_run: bool) -> Result<()> {
    let (_loaded, cfg) = load_config(config_paths)?;
    let raw = std::fs::read_to_string(titles)
        .with_context(|| format!("read titles failed: {}", titles.display()))?;
    let signals = tkr_edgar::parse_titles(&raw);

    let pool = tkr_db::connect_from_env().await?;
    let active = PgEventLog::new(pool.clone()).all_active_latest().await?;
    let matches = match_feed_signals(&signals, &active);
    info!(signals = signals.len(), matches = matches.len(), "feed matched");

    for m in &matches {
        println!(
            "match key={} symbol={} forms={}",
            m.key,
            m.symbol,
            m.form_types.join(",")
        );
    }
    if dry_run || matches.is_empty() {
        println!("signals={} matches={} refreshed=0 skipped=0", signals.len(), matches.len());
        return Ok(());
    }

    let client = build_client(&cfg)?;
    let resolver = cfg.revenue_resolver()?;
    let enricher = Enricher {
        client: &client,
        pool: &pool,
        resolver: &resolver,
        refresh_profiles: cfg.reconcile.refresh_profiles,
        at: cycle_timestamp(),
    };
    let mut tally = EnrichTally::default();
    for m in &matches {
        enricher.refresh(m.key, &mut tally).await?;
    }

    println!(
        "signals={} matches={} refreshed={} skipped={}",
        signals.len(),
        matches.len(),
        tally.refreshed,
        tally.skipped
    );
    Ok(())
}
