//! Pagination driver: walks review-listing pages for one app and feeds each
//! page through extract + upsert incrementally, so progress already committed
//! survives a later abort.
//!
//! Page order is strictly sequential with a polite delay between requests.
//! That is a deliberate constraint toward the upstream site, not a
//! performance ceiling — concurrency belongs across apps, never within one.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::apps::CanonicalApp;
use crate::scrape::extractor::{ExtractorConfig, ReviewExtractor};
use crate::scrape::fetcher::PageFetcher;
use crate::storage::{upsert_reviews, UpsertSummary};
use crate::util::db::Db;

#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    /// Hard page cap per run; the usual stop is the first empty page.
    pub max_pages: u32,
    /// Polite delay between page fetches.
    pub page_delay: Duration,
    /// Overall wall-clock budget for one app-scrape, so a slow upstream
    /// cannot stall a scheduled sweep indefinitely.
    pub budget: Duration,
    /// Observed between pages: cancellation stops the loop before the next
    /// fetch and whatever was persisted stands as a partial success.
    pub cancel: CancellationToken,
    pub extractor: ExtractorConfig,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            max_pages: 20,
            page_delay: Duration::from_millis(250),
            budget: Duration::from_secs(45),
            cancel: CancellationToken::new(),
            extractor: ExtractorConfig::default(),
        }
    }
}

/// What one app-scrape did. This is the boundary no error crosses: fetch,
/// parse and storage failures all collapse into `success`/`message`.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeOutcome {
    pub success: bool,
    pub message: String,
    pub inserted: u64,
    pub duplicates: u64,
    pub skipped: u64,
    /// Pages that yielded review data; the terminal empty page is not one.
    pub pages_fetched: u32,
}

impl ScrapeOutcome {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            inserted: 0,
            duplicates: 0,
            skipped: 0,
            pages_fetched: 0,
        }
    }
}

/// Scrape one canonical app: fetch pages 1.. until end-of-data, a failure,
/// the page cap, the budget, or cancellation.
pub async fn scrape_app(
    db: &Db,
    fetcher: &dyn PageFetcher,
    app: &CanonicalApp,
    opts: &ScrapeOptions,
) -> ScrapeOutcome {
    let extractor = match ReviewExtractor::with_config(&opts.extractor) {
        Ok(e) => e,
        Err(e) => return ScrapeOutcome::failed(format!("extractor config rejected: {e}")),
    };

    let started = Instant::now();
    let mut totals = UpsertSummary::default();
    let mut pages_fetched = 0u32;
    let mut message = format!("reached page cap ({})", opts.max_pages);
    let mut success = true;

    for page in 1..=opts.max_pages {
        if opts.cancel.is_cancelled() {
            message = format!("cancelled before page {page}");
            break;
        }
        if started.elapsed() >= opts.budget {
            message = format!("scrape budget exhausted before page {page}");
            break;
        }

        let url = app.review_page_url(page);
        let html = match fetcher.fetch_page(&url).await {
            Ok(html) => html,
            Err(e) if page == 1 => {
                warn!(app = app.name, error = %e, "first page fetch failed");
                return ScrapeOutcome::failed(format!("could not reach upstream: {e}"));
            }
            Err(e) => {
                warn!(app = app.name, page, error = %e, "fetch failed mid-run; keeping earlier pages");
                message = format!("stopped on page {page} ({e}); earlier pages kept");
                break;
            }
        };
        let candidates = extractor.extract(&html);
        if candidates.is_empty() {
            message = format!("end of results after {pages_fetched} page(s)");
            break;
        }
        pages_fetched += 1;

        match upsert_reviews(db, app.name, &candidates).await {
            Ok(summary) => {
                totals.inserted += summary.inserted;
                totals.duplicates += summary.duplicates;
                totals.skipped += summary.skipped;
            }
            Err(e) => {
                // Committed pages stay committed; this page's batch is lost.
                warn!(app = app.name, page, error = %e, "storage error; aborting run");
                message = format!("storage error on page {page}; earlier pages kept");
                success = totals.inserted > 0 || totals.duplicates > 0;
                break;
            }
        }

        if page < opts.max_pages {
            tokio::select! {
                _ = opts.cancel.cancelled() => {
                    message = format!("cancelled after page {page}");
                    break;
                }
                _ = tokio::time::sleep(opts.page_delay) => {}
            }
        }
    }

    info!(
        app = app.name,
        pages = pages_fetched,
        inserted = totals.inserted,
        duplicates = totals.duplicates,
        skipped = totals.skipped,
        "scrape finished: {message}"
    );

    ScrapeOutcome {
        success,
        message,
        inserted: totals.inserted,
        duplicates: totals.duplicates,
        skipped: totals.skipped,
        pages_fetched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::find_app;
    use crate::scrape::error::FetchError;
    use async_trait::async_trait;

    /// Fetcher scripted per page number; pages past the script are empty.
    struct ScriptedFetcher {
        pages: Vec<Result<String, FetchError>>,
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
            let page: usize = url
                .split("page=")
                .nth(1)
                .and_then(|s| s.split('&').next())
                .and_then(|s| s.parse().ok())
                .unwrap();
            match self.pages.get(page - 1) {
                Some(Ok(html)) => Ok(html.clone()),
                Some(Err(e)) => Err(clone_err(e)),
                None => Ok("<html><body></body></html>".to_string()),
            }
        }
    }

    /// Serves endless data pages, each after a fixed delay.
    struct SlowFetcher {
        delay: Duration,
    }

    #[async_trait]
    impl PageFetcher for SlowFetcher {
        async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
            tokio::time::sleep(self.delay).await;
            let page = url
                .split("page=")
                .nth(1)
                .and_then(|s| s.split('&').next())
                .unwrap();
            Ok(page_with_reviews(&[&format!("store-{page}")]))
        }
    }

    fn clone_err(e: &FetchError) -> FetchError {
        match e {
            FetchError::Timeout => FetchError::Timeout,
            FetchError::Transport(s) => FetchError::Transport(s.clone()),
            FetchError::Status(c) => FetchError::Status(*c),
            FetchError::InvalidUrl(s) => FetchError::InvalidUrl(s.clone()),
        }
    }

    fn page_with_reviews(stores: &[&str]) -> String {
        let blocks: Vec<String> = stores
            .iter()
            .map(|store| {
                format!(
                    r#"<div data-review-content-id="{store}">
                         <div class="review-star-rating">
                           <span class="filled-star"></span><span class="filled-star"></span>
                           <span class="filled-star"></span><span class="filled-star"></span>
                         </div>
                         <h3 class="review-merchant-name">{store}</h3>
                         <p class="review-merchant-location">Canada</p>
                         <div class="review-content">Review from {store}</div>
                         <time class="review-date">June 5, 2024</time>
                       </div>"#
                )
            })
            .collect();
        format!("<html><body>{}</body></html>", blocks.join("\n"))
    }

    fn fast_opts() -> ScrapeOptions {
        ScrapeOptions {
            page_delay: Duration::from_millis(0),
            ..Default::default()
        }
    }

    async fn review_count(db: &Db) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM reviews")
            .fetch_one(&db.pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn stops_on_first_empty_page() {
        let db = Db::connect_test().await.unwrap();
        let fetcher = ScriptedFetcher {
            pages: vec![Ok(page_with_reviews(&["a", "b"])), Ok(page_with_reviews(&["c"]))],
        };
        let app = find_app("StoreSEO").unwrap();

        let outcome = scrape_app(&db, &fetcher, app, &fast_opts()).await;
        assert!(outcome.success);
        assert_eq!(outcome.inserted, 3);
        assert_eq!(outcome.pages_fetched, 2);
        assert!(outcome.message.contains("after 2 page(s)"));
        assert_eq!(review_count(&db).await, 3);
    }

    #[tokio::test]
    async fn rerun_on_identical_pages_inserts_nothing() {
        let db = Db::connect_test().await.unwrap();
        let fetcher = ScriptedFetcher {
            pages: vec![Ok(page_with_reviews(&["a", "b", "c"]))],
        };
        let app = find_app("StoreSEO").unwrap();

        let first = scrape_app(&db, &fetcher, app, &fast_opts()).await;
        assert_eq!(first.inserted, 3);

        let second = scrape_app(&db, &fetcher, app, &fast_opts()).await;
        assert!(second.success);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 3);
        assert_eq!(review_count(&db).await, 3);
    }

    #[tokio::test]
    async fn mid_run_fetch_failure_keeps_earlier_pages() {
        let db = Db::connect_test().await.unwrap();
        let fetcher = ScriptedFetcher {
            pages: vec![
                Ok(page_with_reviews(&["a", "b"])),
                Ok(page_with_reviews(&["c", "d"])),
                Err(FetchError::Status(503)),
            ],
        };
        let app = find_app("StoreSEO").unwrap();

        let outcome = scrape_app(&db, &fetcher, app, &fast_opts()).await;
        assert!(outcome.success, "partial result is still a success");
        assert_eq!(outcome.inserted, 4);
        assert_eq!(outcome.pages_fetched, 2);
        assert_eq!(review_count(&db).await, 4);

        // A later clean run finds page 3's reviews without losing or
        // duplicating pages 1-2.
        let healed = ScriptedFetcher {
            pages: vec![
                Ok(page_with_reviews(&["a", "b"])),
                Ok(page_with_reviews(&["c", "d"])),
                Ok(page_with_reviews(&["e"])),
            ],
        };
        let outcome = scrape_app(&db, &healed, app, &fast_opts()).await;
        assert_eq!(outcome.inserted, 1);
        assert_eq!(review_count(&db).await, 5);
    }

    #[tokio::test]
    async fn first_page_failure_is_a_clean_failure() {
        let db = Db::connect_test().await.unwrap();
        let fetcher = ScriptedFetcher {
            pages: vec![Err(FetchError::Timeout)],
        };
        let app = find_app("StoreSEO").unwrap();

        let outcome = scrape_app(&db, &fetcher, app, &fast_opts()).await;
        assert!(!outcome.success);
        assert_eq!(outcome.inserted, 0);
        assert!(outcome.message.contains("could not reach upstream"));
        assert_eq!(review_count(&db).await, 0);
    }

    #[tokio::test]
    async fn respects_page_cap() {
        let db = Db::connect_test().await.unwrap();
        let fetcher = ScriptedFetcher {
            pages: vec![
                Ok(page_with_reviews(&["a"])),
                Ok(page_with_reviews(&["b"])),
                Ok(page_with_reviews(&["c"])),
            ],
        };
        let app = find_app("StoreSEO").unwrap();
        let opts = ScrapeOptions {
            max_pages: 2,
            ..fast_opts()
        };

        let outcome = scrape_app(&db, &fetcher, app, &opts).await;
        assert_eq!(outcome.pages_fetched, 2);
        assert_eq!(outcome.inserted, 2);
        assert!(outcome.message.contains("page cap"));
    }

    #[tokio::test]
    async fn budget_exhaustion_keeps_committed_pages() {
        let db = Db::connect_test().await.unwrap();
        let fetcher = SlowFetcher {
            delay: Duration::from_millis(60),
        };
        let app = find_app("StoreSEO").unwrap();
        let opts = ScrapeOptions {
            budget: Duration::from_millis(100),
            ..fast_opts()
        };

        let outcome = scrape_app(&db, &fetcher, app, &opts).await;
        assert!(outcome.success, "budget stop is a valid partial result");
        assert!(outcome.message.contains("budget"));
        assert!(outcome.pages_fetched >= 1);
        assert!(outcome.pages_fetched < opts.max_pages);
        assert_eq!(review_count(&db).await as u64, outcome.inserted);
    }

    #[tokio::test]
    async fn cancellation_stops_before_next_fetch() {
        let db = Db::connect_test().await.unwrap();
        let fetcher = ScriptedFetcher {
            pages: vec![Ok(page_with_reviews(&["a"])), Ok(page_with_reviews(&["b"]))],
        };
        let app = find_app("StoreSEO").unwrap();
        let opts = fast_opts();
        opts.cancel.cancel();

        let outcome = scrape_app(&db, &fetcher, app, &opts).await;
        assert!(outcome.success, "cancellation is a valid partial result");
        assert_eq!(outcome.pages_fetched, 0);
        assert!(outcome.message.contains("cancelled"));
    }
}
