//! Per-(device, app) scrape cooldown.
//!
//! The reference dashboard kept this state client-side, which made the
//! cooldown advisory at best. Here it lives in a keyed store behind an
//! explicit service boundary so the scrape endpoint can enforce it. It is
//! still UX-level protection, not a security control: the endpoint itself is
//! idempotent and budget-bounded, so a bypass is cheap, not catastrophic.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::util::db::Db;
use crate::util::env;

pub const DEFAULT_COOLDOWN_SECS: i64 = 6 * 60 * 60;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CooldownStatus {
    pub allowed_now: bool,
    pub remaining_seconds: i64,
    pub next_run_at: Option<DateTime<Utc>>,
}

impl CooldownStatus {
    fn open() -> Self {
        Self {
            allowed_now: true,
            remaining_seconds: 0,
            next_run_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CooldownGate {
    window: Duration,
}

impl CooldownGate {
    pub fn new(window_secs: i64) -> Self {
        Self {
            window: Duration::seconds(window_secs.max(0)),
        }
    }

    /// Window from `COOLDOWN_SECS`, defaulting to six hours.
    pub fn from_env() -> Self {
        Self::new(env::env_parse("COOLDOWN_SECS", DEFAULT_COOLDOWN_SECS))
    }

    /// Is this device allowed to trigger a scrape for this app right now?
    pub async fn check(&self, db: &Db, device_id: &str, app_name: &str) -> Result<CooldownStatus> {
        self.check_at(db, device_id, app_name, Utc::now()).await
    }

    async fn check_at(
        &self,
        db: &Db,
        device_id: &str,
        app_name: &str,
        now: DateTime<Utc>,
    ) -> Result<CooldownStatus> {
        let last: Option<String> = sqlx::query_scalar(
            "SELECT last_scrape_at FROM scrape_cooldowns WHERE device_id = $1 AND app_name = $2",
        )
        .bind(device_id)
        .bind(app_name)
        .fetch_optional(&db.pool)
        .await?;

        let Some(raw) = last else {
            return Ok(CooldownStatus::open());
        };
        // An unparseable timestamp means the row is corrupt; treat the gate
        // as open rather than locking the device out.
        let Ok(last_at) = DateTime::parse_from_rfc3339(&raw) else {
            return Ok(CooldownStatus::open());
        };

        let next_run_at = last_at.with_timezone(&Utc) + self.window;
        let remaining = (next_run_at - now).num_seconds();
        if remaining <= 0 {
            Ok(CooldownStatus::open())
        } else {
            Ok(CooldownStatus {
                allowed_now: false,
                remaining_seconds: remaining,
                next_run_at: Some(next_run_at),
            })
        }
    }

    /// Record that a scrape was just triggered for (device, app).
    pub async fn record(&self, db: &Db, device_id: &str, app_name: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO scrape_cooldowns (device_id, app_name, last_scrape_at) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (device_id, app_name) DO UPDATE SET \
                last_scrape_at = excluded.last_scrape_at",
        )
        .bind(device_id)
        .bind(app_name)
        .bind(Utc::now().to_rfc3339())
        .execute(&db.pool)
        .await?;
        Ok(())
    }
}
