pub mod api;
pub mod apps;
pub mod ratelimit;
pub mod scrape;
pub mod storage;
pub mod util;

pub use apps::{find_app, CanonicalApp, CANONICAL_APPS};
pub use scrape::driver::{scrape_app, ScrapeOptions, ScrapeOutcome};
pub use scrape::monitor::{run_monitoring, MonitorOptions, MonitoringReport};
pub use storage::reconcile::{reconcile, ReconcileSummary};
pub use util::db::Db;
