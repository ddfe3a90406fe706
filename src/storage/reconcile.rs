//! Allow-list reconciliation: purge rows for apps outside the canonical set
//! and make sure every canonical app has a metadata row.
//!
//! Runs post-deploy and on demand (`rr reconcile`). Idempotent. Each table is
//! swept independently: one table failing (including not existing yet) is
//! logged and the sweep moves on, matching maintenance semantics where a
//! partially provisioned database is normal.

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::apps::CanonicalApp;
use crate::util::db::Db;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub removed_reviews: u64,
    pub removed_metadata: u64,
    pub removed_cooldowns: u64,
    /// Metadata rows newly created for canonical apps that lacked one.
    pub ensured_metadata: u64,
}

fn placeholders(n: usize) -> String {
    (1..=n)
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

async fn purge_table(db: &Db, table: &str, key_column: &str, canonical: &[CanonicalApp]) -> u64 {
    let sql = format!(
        "DELETE FROM {table} WHERE {key_column} NOT IN ({})",
        placeholders(canonical.len())
    );
    let mut query = sqlx::query(&sql);
    for app in canonical {
        query = query.bind(app.name);
    }
    match query.execute(&db.pool).await {
        Ok(res) => res.rows_affected(),
        Err(e) => {
            // Continue with the other tables; a missing table is non-fatal.
            warn!(table, error = %e, "reconcile purge failed; continuing");
            0
        }
    }
}

/// Enforce the allow-list invariant over every app-keyed table.
pub async fn reconcile(db: &Db, canonical: &[CanonicalApp]) -> Result<ReconcileSummary> {
    let mut summary = ReconcileSummary {
        removed_reviews: purge_table(db, "reviews", "app_name", canonical).await,
        removed_metadata: purge_table(db, "app_metadata", "app_name", canonical).await,
        removed_cooldowns: purge_table(db, "scrape_cooldowns", "app_name", canonical).await,
        ensured_metadata: 0,
    };

    for app in canonical {
        let res = sqlx::query(
            "INSERT INTO app_metadata (app_name) VALUES ($1) \
             ON CONFLICT (app_name) DO NOTHING",
        )
        .bind(app.name)
        .execute(&db.pool)
        .await;
        match res {
            Ok(r) => summary.ensured_metadata += r.rows_affected(),
            Err(e) => warn!(app = app.name, error = %e, "ensure metadata row failed; continuing"),
        }
    }

    info!(
        removed_reviews = summary.removed_reviews,
        removed_metadata = summary.removed_metadata,
        removed_cooldowns = summary.removed_cooldowns,
        ensured_metadata = summary.ensured_metadata,
        "reconciliation complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::CANONICAL_APPS;
    use chrono::NaiveDate;

    async fn seed_reviews(db: &Db, app: &str, n: u32) {
        for i in 0..n {
            sqlx::query(
                "INSERT INTO reviews (app_name, store_name, rating, content, content_hash, review_date) \
                 VALUES ($1, $2, 5, '', $3, $4)",
            )
            .bind(app)
            .bind(format!("store-{i}"))
            .bind(format!("hash-{app}-{i}"))
            .bind(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .execute(&db.pool)
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn purges_non_canonical_apps_and_ensures_metadata() {
        let db = Db::connect_test().await.unwrap();
        seed_reviews(&db, "StoreSEO", 10).await;
        seed_reviews(&db, "Vitals", 4).await;

        let summary = reconcile(&db, &CANONICAL_APPS).await.unwrap();
        assert_eq!(summary.removed_reviews, 4);
        assert_eq!(summary.ensured_metadata, 6);

        let vitals: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE app_name = 'Vitals'")
                .fetch_one(&db.pool)
                .await
                .unwrap();
        assert_eq!(vitals, 0);

        let kept: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE app_name = 'StoreSEO'")
                .fetch_one(&db.pool)
                .await
                .unwrap();
        assert_eq!(kept, 10);

        let metadata_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM app_metadata")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(metadata_rows, 6);
    }

    #[tokio::test]
    async fn reconcile_is_idempotent() {
        let db = Db::connect_test().await.unwrap();
        seed_reviews(&db, "Vitals", 2).await;

        let first = reconcile(&db, &CANONICAL_APPS).await.unwrap();
        assert_eq!(first.removed_reviews, 2);

        let second = reconcile(&db, &CANONICAL_APPS).await.unwrap();
        assert_eq!(second.removed_reviews, 0);
        assert_eq!(second.ensured_metadata, 0);
    }

    #[tokio::test]
    async fn purges_stale_cooldown_rows() {
        let db = Db::connect_test().await.unwrap();
        sqlx::query(
            "INSERT INTO scrape_cooldowns (device_id, app_name, last_scrape_at) \
             VALUES ('dev-1', 'Vitals', '2024-01-01T00:00:00Z')",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let summary = reconcile(&db, &CANONICAL_APPS).await.unwrap();
        assert_eq!(summary.removed_cooldowns, 1);
    }
}
