//! Scrape-side error taxonomy.
//!
//! Fetch failures are retryable by a future scheduled run; nothing in this
//! module is retried inline. Parse problems never surface here at all — the
//! extractor skips malformed blocks at block granularity.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Request exceeded the per-call timeout.
    #[error("request timed out")]
    Timeout,

    /// Transport-level failure (DNS, connect, TLS, read).
    #[error("transport error: {0}")]
    Transport(String),

    /// Upstream answered with a non-success status. Never treated as a page.
    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}
