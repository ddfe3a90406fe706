//! Scrape pipeline: fetch -> extract -> paginate -> upsert.

pub mod driver;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod monitor;
