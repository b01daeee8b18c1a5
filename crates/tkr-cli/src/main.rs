use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "tkr")]
#[command(about = "Ticker registry reconciler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local ...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Run one reconciliation cycle against the upstream directory
    Sync {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Classify against a copy of the stored log; write nothing.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Refresh profile and revenue for every active entity
    Enrich {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },

    /// Match filing-feed titles to active entities and refresh those
    Feed {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Text file, one feed title per line
        #[arg(long)]
        titles: PathBuf,

        /// Print matches only.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Print or export the current projection (active entities, latest state)
    Project {
        /// Layered config paths (for /export/projection_csv)
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// CSV output path; stdout when absent and not configured
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Export active entities with profiles, highest revenue first
    ExportProfiles {
        /// Layered config paths (for /export/profiles_csv)
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// CSV output path; stdout when absent and not configured
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience). Silent when absent.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = tkr_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = tkr_db::status(&pool).await?;
                    println!(
                        "db_ok={} has_events_table={} event_count={}",
                        s.ok, s.has_events_table, s.event_count
                    );
                }
                DbCmd::Migrate => {
                    tkr_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = tkr_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Sync {
            config_paths,
            dry_run,
        } => commands::sync::run_sync(&config_paths, dry_run).await?,

        Commands::Enrich { config_paths } => commands::sync::run_enrich(&config_paths).await?,

        Commands::Feed {
            config_paths,
            titles,
            dry_run,
        } => commands::sync::run_feed(&config_paths, &titles, dry_run).await?,

        Commands::Project { config_paths, csv } => {
            commands::export::run_project(&config_paths, csv).await?
        }

        Commands::ExportProfiles { config_paths, csv } => {
            commands::export::run_export_profiles(&config_paths, csv).await?
        }
    }

    Ok(())
}

/// Logs go to stderr; stdout carries command output (key=value lines, CSV).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
