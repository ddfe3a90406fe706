//! Review persistence: validation, dedup upsert, denormalized app stats.

pub mod reconcile;

use std::sync::OnceLock;

use anyhow::{bail, Result};
use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::Row;
use tracing::{debug, warn};

use crate::scrape::extractor::ReviewCandidate;
use crate::util::db::Db;

/// Hex SHA-256 of the review body; the stored fingerprint that backs the
/// (app, store, date, content) identity key.
pub fn content_fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

/// Template-like placeholder bodies are scrape defects, not reviews:
/// unexpanded merge fields and lorem-ipsum filler must never be stored.
pub fn is_placeholder_content(content: &str) -> bool {
    static MERGE_FIELD: OnceLock<Regex> = OnceLock::new();
    let merge = MERGE_FIELD.get_or_init(|| Regex::new(r"\{\{[^}]*\}\}").expect("static regex"));
    merge.is_match(content) || content.to_ascii_lowercase().contains("lorem ipsum")
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpsertSummary {
    /// Rows actually newly created. User-visible; never overcounts.
    pub inserted: u64,
    /// Candidates already present under the identity key.
    pub duplicates: u64,
    /// Candidates dropped by validation (bad rating, missing identity
    /// fields, placeholder content).
    pub skipped: u64,
}

fn validate(candidate: &ReviewCandidate) -> Option<(&str, chrono::NaiveDate)> {
    if !(1..=5).contains(&candidate.rating) {
        return None;
    }
    let store = candidate.store_name.as_deref()?.trim();
    if store.is_empty() {
        return None;
    }
    let date = candidate.review_date?;
    if let Some(content) = candidate.content.as_deref() {
        if is_placeholder_content(content) {
            return None;
        }
    }
    Some((store, date))
}

/// Merge freshly extracted candidates into storage.
///
/// Only allow-listed apps may gain rows; callers resolve names through
/// `find_app` first, and this is the backstop at the write boundary.
///
/// Insertion is a single conditional `INSERT ... ON CONFLICT DO NOTHING`
/// against the unique identity index, so two concurrent scrapers racing over
/// the same app cannot both insert the same review. A storage error aborts
/// the current batch but leaves previously committed batches intact.
pub async fn upsert_reviews(
    db: &Db,
    app_name: &str,
    candidates: &[ReviewCandidate],
) -> Result<UpsertSummary> {
    if !crate::apps::is_canonical(app_name) {
        bail!("refusing to store reviews for unknown app {app_name:?}");
    }

    let mut summary = UpsertSummary::default();

    for candidate in candidates {
        let Some((store, date)) = validate(candidate) else {
            debug!(app = app_name, ?candidate, "dropping invalid candidate");
            summary.skipped += 1;
            continue;
        };
        let content = candidate.content.as_deref().unwrap_or("");

        let res = sqlx::query(
            "INSERT INTO reviews (app_name, store_name, country, rating, content, content_hash, review_date) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (app_name, store_name, review_date, content_hash) DO NOTHING",
        )
        .bind(app_name)
        .bind(store)
        .bind(candidate.country.as_deref())
        .bind(candidate.rating as i64)
        .bind(content)
        .bind(content_fingerprint(content))
        .bind(date)
        .execute(&db.pool)
        .await?;

        if res.rows_affected() > 0 {
            summary.inserted += 1;
        } else {
            summary.duplicates += 1;
        }
    }

    Ok(summary)
}

/// Denormalized per-app aggregates, one row in `app_metadata`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppStats {
    pub app_name: String,
    pub total_reviews: i64,
    pub average_rating: f64,
    pub one_star: i64,
    pub two_star: i64,
    pub three_star: i64,
    pub four_star: i64,
    pub five_star: i64,
}

/// Recompute an app's aggregate row from its active reviews.
pub async fn refresh_app_stats(db: &Db, app_name: &str) -> Result<AppStats> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS total, \
                CAST(COALESCE(AVG(rating), 0) AS REAL) AS avg_rating, \
                COALESCE(SUM(rating = 1), 0) AS s1, \
                COALESCE(SUM(rating = 2), 0) AS s2, \
                COALESCE(SUM(rating = 3), 0) AS s3, \
                COALESCE(SUM(rating = 4), 0) AS s4, \
                COALESCE(SUM(rating = 5), 0) AS s5 \
         FROM reviews WHERE app_name = $1 AND active = 1",
    )
    .bind(app_name)
    .fetch_one(&db.pool)
    .await?;

    let stats = AppStats {
        app_name: app_name.to_string(),
        total_reviews: row.get("total"),
        average_rating: row.get("avg_rating"),
        one_star: row.get("s1"),
        two_star: row.get("s2"),
        three_star: row.get("s3"),
        four_star: row.get("s4"),
        five_star: row.get("s5"),
    };

    sqlx::query(
        "INSERT INTO app_metadata \
            (app_name, total_reviews, average_rating, one_star, two_star, three_star, four_star, five_star, last_updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (app_name) DO UPDATE SET \
            total_reviews = excluded.total_reviews, \
            average_rating = excluded.average_rating, \
            one_star = excluded.one_star, \
            two_star = excluded.two_star, \
            three_star = excluded.three_star, \
            four_star = excluded.four_star, \
            five_star = excluded.five_star, \
            last_updated_at = excluded.last_updated_at",
    )
    .bind(&stats.app_name)
    .bind(stats.total_reviews)
    .bind(stats.average_rating)
    .bind(stats.one_star)
    .bind(stats.two_star)
    .bind(stats.three_star)
    .bind(stats.four_star)
    .bind(stats.five_star)
    .bind(Utc::now().to_rfc3339())
    .execute(&db.pool)
    .await?;

    Ok(stats)
}

/// Read an app's metadata row, if one exists.
pub async fn get_app_stats(db: &Db, app_name: &str) -> Result<Option<AppStats>> {
    let row = sqlx::query(
        "SELECT app_name, total_reviews, average_rating, one_star, two_star, three_star, four_star, five_star \
         FROM app_metadata WHERE app_name = $1",
    )
    .bind(app_name)
    .fetch_optional(&db.pool)
    .await?;

    Ok(row.map(|r| AppStats {
        app_name: r.get("app_name"),
        total_reviews: r.get("total_reviews"),
        average_rating: r.get("average_rating"),
        one_star: r.get("one_star"),
        two_star: r.get("two_star"),
        three_star: r.get("three_star"),
        four_star: r.get("four_star"),
        five_star: r.get("five_star"),
    }))
}

/// Row counts for the app-keyed tables; used by `rr db-counts`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TableCounts {
    pub reviews: i64,
    pub app_metadata: i64,
    pub scrape_cooldowns: i64,
}

pub async fn table_counts(db: &Db) -> Result<TableCounts> {
    async fn count(db: &Db, table: &str) -> i64 {
        match sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&db.pool)
            .await
        {
            Ok(n) => n,
            Err(e) => {
                warn!(table, error = %e, "count query failed; reporting 0");
                0
            }
        }
    }
    Ok(TableCounts {
        reviews: count(db, "reviews").await,
        app_metadata: count(db, "app_metadata").await,
        scrape_cooldowns: count(db, "scrape_cooldowns").await,
    })
}
