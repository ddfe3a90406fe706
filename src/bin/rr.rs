use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;

use review_radar::scrape::fetcher::HttpFetcher;
use review_radar::storage;
use review_radar::util::{env, tracing as tracing_util};
use review_radar::{
    find_app, reconcile, run_monitoring, scrape_app, Db, MonitorOptions, ScrapeOptions,
    CANONICAL_APPS,
};

#[derive(Parser, Debug)]
#[command(name = "rr", version, about = "ReviewRadar admin CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Purge rows for apps outside the canonical allow-list and ensure each
    /// canonical app has a metadata row. Idempotent; run after deploys.
    Reconcile {
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
    /// One-off scrape of a single canonical app (name or slug)
    Scrape {
        app: String,
        /// Hard page cap for this run
        #[arg(long, default_value_t = 20)]
        max_pages: u32,
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
    /// Run the monitoring sweep (all apps, or one with --app)
    Monitor {
        /// Limit the sweep to one canonical app (name or slug)
        #[arg(long)]
        app: Option<String>,
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
    /// Print row counts for the app-keyed tables
    DbCounts {
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
    /// Apply the schema to a fresh database file
    InitDb {
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
}

async fn connect(db_url: Option<String>) -> Result<Db> {
    let url = db_url.unwrap_or_else(env::db_url);
    Db::connect(&url, env::env_parse("DB_MAX_CONNECTIONS", 5)).await
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_util::init_tracing("info,sqlx=warn")?;
    env::init_env();
    let cli = Cli::parse();

    match cli.command {
        Commands::Reconcile { db_url } => {
            let db = connect(db_url).await?;
            let summary = reconcile(&db, &CANONICAL_APPS).await?;
            println!(
                "reconciled: removed {} reviews, {} metadata rows, {} cooldowns; ensured {} metadata rows",
                summary.removed_reviews,
                summary.removed_metadata,
                summary.removed_cooldowns,
                summary.ensured_metadata
            );
        }
        Commands::Scrape {
            app,
            max_pages,
            db_url,
        } => {
            let Some(app) = find_app(&app) else {
                bail!(
                    "unknown app {app:?}; canonical apps: {}",
                    CANONICAL_APPS
                        .iter()
                        .map(|a| a.name)
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            };
            let db = connect(db_url).await?;
            let fetcher = HttpFetcher::new(None)
                .map_err(|e| anyhow::anyhow!("failed to build fetcher: {e}"))?;
            let opts = ScrapeOptions {
                max_pages,
                budget: Duration::from_secs(env::env_parse("SCRAPE_BUDGET_SECS", 120u64)),
                ..Default::default()
            };
            let outcome = scrape_app(&db, &fetcher, app, &opts).await;
            storage::refresh_app_stats(&db, app.name).await?;
            println!(
                "{}: {} new, {} duplicate, {} skipped over {} page(s) — {}",
                app.name,
                outcome.inserted,
                outcome.duplicates,
                outcome.skipped,
                outcome.pages_fetched,
                outcome.message
            );
            if !outcome.success {
                bail!("scrape failed: {}", outcome.message);
            }
        }
        Commands::Monitor { app, db_url } => {
            let target = match app.as_deref() {
                Some(name) => match find_app(name) {
                    Some(a) => Some(a),
                    None => bail!("unknown app {name:?}"),
                },
                None => None,
            };
            let db = connect(db_url).await?;
            let fetcher = HttpFetcher::new(None)
                .map_err(|e| anyhow::anyhow!("failed to build fetcher: {e}"))?;
            let report = run_monitoring(&db, &fetcher, target, &MonitorOptions::default()).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.success {
                bail!("monitoring run failed");
            }
        }
        Commands::DbCounts { db_url } => {
            let db = connect(db_url).await?;
            let counts = storage::table_counts(&db).await?;
            println!("reviews:          {}", counts.reviews);
            println!("app_metadata:     {}", counts.app_metadata);
            println!("scrape_cooldowns: {}", counts.scrape_cooldowns);
        }
        Commands::InitDb { db_url } => {
            let db = connect(db_url).await?;
            db.apply_schema().await?;
            println!("schema applied");
        }
    }

    Ok(())
}
