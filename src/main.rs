//! Monitoring daemon: periodically sweeps every canonical app so dashboard
//! data stays fresh without user-triggered scrapes.

use anyhow::Result;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use review_radar::scrape::fetcher::HttpFetcher;
use review_radar::util::{env, tracing as tracing_util};
use review_radar::{reconcile, run_monitoring, Db, MonitorOptions, ScrapeOptions, CANONICAL_APPS};

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 6 * 60 * 60;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_util::init_tracing("info,sqlx=warn")?;
    env::init_env();

    let db = Db::connect(&env::db_url(), env::env_parse("DB_MAX_CONNECTIONS", 5)).await?;

    // Post-deploy hygiene: enforce the allow-list before the first sweep.
    if env::env_flag("RECONCILE_ON_START", true) {
        let summary = reconcile(&db, &CANONICAL_APPS).await?;
        info!(?summary, "startup reconciliation done");
    }

    let fetcher =
        HttpFetcher::new(None).map_err(|e| anyhow::anyhow!("failed to build fetcher: {e}"))?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl-c received; finishing current page and shutting down");
                cancel.cancel();
            }
        });
    }

    let interval = Duration::from_secs(env::env_parse(
        "MONITOR_INTERVAL_SECS",
        DEFAULT_SWEEP_INTERVAL_SECS,
    ));
    let opts = MonitorOptions {
        scrape: ScrapeOptions {
            cancel: cancel.clone(),
            ..Default::default()
        },
        ..Default::default()
    };

    let mut skip_sweep = env::env_flag("MONITOR_SKIP_INITIAL", false);
    loop {
        if cancel.is_cancelled() {
            info!("shutdown requested; exiting");
            break;
        }

        if skip_sweep {
            skip_sweep = false;
        } else {
            let report = run_monitoring(&db, &fetcher, None, &opts).await;
            if report.success {
                info!(
                    total_new_reviews = report.total_new_reviews,
                    execution_time_ms = report.execution_time_ms,
                    "sweep complete"
                );
            } else {
                warn!(
                    execution_time_ms = report.execution_time_ms,
                    "sweep failed for every app; upstream likely unreachable"
                );
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                info!("shutdown requested; exiting");
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }

    Ok(())
}
