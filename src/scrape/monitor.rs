//! Monitoring sweep: the scheduled path that keeps review data fresh without
//! user interaction. One app or the whole allow-list, sequentially, with an
//! inter-app delay; one app failing never stops the sweep.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::apps::{CanonicalApp, CANONICAL_APPS};
use crate::scrape::driver::{scrape_app, ScrapeOptions};
use crate::scrape::fetcher::PageFetcher;
use crate::storage::{refresh_app_stats, AppStats};
use crate::util::db::Db;

#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub scrape: ScrapeOptions,
    /// Pause between apps in a full sweep; politeness toward the upstream.
    pub app_delay: Duration,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            scrape: ScrapeOptions::default(),
            app_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AppSweepResult {
    pub app_name: String,
    pub success: bool,
    pub new_reviews_found: u64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_stats: Option<AppStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitoringReport {
    pub success: bool,
    /// Set when the run targeted a single app.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_reviews_found: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_stats: Option<AppStats>,
    /// Set on a full sweep.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_new_reviews: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub apps: Vec<AppSweepResult>,
    pub execution_time_ms: u64,
}

async fn sweep_one(db: &Db, fetcher: &dyn PageFetcher, app: &CanonicalApp, opts: &MonitorOptions) -> AppSweepResult {
    let outcome = scrape_app(db, fetcher, app, &opts.scrape).await;

    // Stats refresh runs even on a partial run; committed rows should be
    // visible to the dashboard immediately.
    let updated_stats = match refresh_app_stats(db, app.name).await {
        Ok(stats) => Some(stats),
        Err(e) => {
            warn!(app = app.name, error = %e, "stats refresh failed");
            None
        }
    };

    AppSweepResult {
        app_name: app.name.to_string(),
        success: outcome.success,
        new_reviews_found: outcome.inserted,
        message: outcome.message,
        updated_stats,
    }
}

/// Run monitoring for one app, or for every canonical app when `target` is
/// `None`.
pub async fn run_monitoring(
    db: &Db,
    fetcher: &dyn PageFetcher,
    target: Option<&CanonicalApp>,
    opts: &MonitorOptions,
) -> MonitoringReport {
    let started = Instant::now();

    if let Some(app) = target {
        let result = sweep_one(db, fetcher, app, opts).await;
        return MonitoringReport {
            success: result.success,
            app_name: Some(result.app_name.clone()),
            new_reviews_found: Some(result.new_reviews_found),
            updated_stats: result.updated_stats.clone(),
            total_new_reviews: None,
            apps: vec![result],
            execution_time_ms: started.elapsed().as_millis() as u64,
        };
    }

    let mut apps = Vec::with_capacity(CANONICAL_APPS.len());
    for (i, app) in CANONICAL_APPS.iter().enumerate() {
        if opts.scrape.cancel.is_cancelled() {
            info!(done = apps.len(), "sweep cancelled; reporting partial results");
            break;
        }
        apps.push(sweep_one(db, fetcher, app, opts).await);

        if i + 1 < CANONICAL_APPS.len() {
            tokio::select! {
                _ = opts.scrape.cancel.cancelled() => {}
                _ = tokio::time::sleep(opts.app_delay) => {}
            }
        }
    }

    let total: u64 = apps.iter().map(|r| r.new_reviews_found).sum();
    // A sweep is useful as long as at least one app came back; per-app
    // failures are listed in the results.
    let success = apps.iter().any(|r| r.success);

    info!(
        apps = apps.len(),
        total_new_reviews = total,
        success,
        "monitoring sweep finished"
    );

    MonitoringReport {
        success,
        app_name: None,
        new_reviews_found: None,
        updated_stats: None,
        total_new_reviews: Some(total),
        apps,
        execution_time_ms: started.elapsed().as_millis() as u64,
    }
}
