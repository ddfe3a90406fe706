use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};

/// Idempotent schema: safe to apply on every connect.
///
/// The unique index over (app_name, store_name, review_date, content_hash) is
/// what backs review dedup — the store enforces it, not application pre-checks,
/// so concurrent scrapers cannot both insert the same review.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS reviews (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    app_name      TEXT NOT NULL,
    store_name    TEXT NOT NULL,
    country       TEXT,
    rating        INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
    content       TEXT NOT NULL DEFAULT '',
    content_hash  TEXT NOT NULL,
    review_date   TEXT NOT NULL,
    earned_by     TEXT,
    active        INTEGER NOT NULL DEFAULT 1,
    created_at    TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE UNIQUE INDEX IF NOT EXISTS ux_reviews_identity
    ON reviews (app_name, store_name, review_date, content_hash);

CREATE INDEX IF NOT EXISTS ix_reviews_app ON reviews (app_name);

CREATE TABLE IF NOT EXISTS app_metadata (
    app_name        TEXT PRIMARY KEY,
    total_reviews   INTEGER NOT NULL DEFAULT 0,
    average_rating  REAL NOT NULL DEFAULT 0,
    one_star        INTEGER NOT NULL DEFAULT 0,
    two_star        INTEGER NOT NULL DEFAULT 0,
    three_star      INTEGER NOT NULL DEFAULT 0,
    four_star       INTEGER NOT NULL DEFAULT 0,
    five_star       INTEGER NOT NULL DEFAULT 0,
    last_updated_at TEXT
);

CREATE TABLE IF NOT EXISTS scrape_cooldowns (
    device_id      TEXT NOT NULL,
    app_name       TEXT NOT NULL,
    last_scrape_at TEXT NOT NULL,
    PRIMARY KEY (device_id, app_name)
);
";

#[derive(Clone)]
pub struct Db {
    pub pool: SqlitePool,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(10))
            .foreign_keys(true);

        // A shared in-memory database only exists on the connection that made
        // it, so pooling beyond one connection would hand out empty databases.
        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            max_connections
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(connect_options)
            .await?;
        info!("connected to db");

        let db = Self { pool };
        db.apply_schema().await?;
        Ok(db)
    }

    /// Apply the idempotent schema. Exposed so `rr init-db` can run it
    /// explicitly against a fresh file.
    pub async fn apply_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// In-memory database for tests.
    #[cfg(test)]
    pub async fn connect_test() -> Result<Self> {
        Self::connect("sqlite::memory:", 1).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_applies_twice_without_error() {
        let db = Db::connect_test().await.unwrap();
        db.apply_schema().await.unwrap();
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn rating_check_constraint_rejects_zero() {
        let db = Db::connect_test().await.unwrap();
        let res = sqlx::query(
            "INSERT INTO reviews (app_name, store_name, rating, content, content_hash, review_date)
             VALUES ('StoreSEO', 'x', 0, '', 'h', '2024-01-01')",
        )
        .execute(&db.pool)
        .await;
        assert!(res.is_err());
    }
}
