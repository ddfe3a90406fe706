// API request/response models (DTOs)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Standard API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: Some(Meta::now()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            meta: Some(Meta::now()),
        }
    }

    /// Failure envelope that still carries a payload, e.g. cooldown details
    /// alongside the refusal.
    pub fn error_with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            success: false,
            data: Some(data),
            error: Some(message.into()),
            meta: Some(Meta::now()),
        }
    }
}

/// Metadata included in all API responses
#[derive(Debug, Serialize, Deserialize)]
pub struct Meta {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub version: String,
}

impl Meta {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: uuid::Uuid::new_v4().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub uptime_seconds: u64,
}

/// Scrape trigger request
#[derive(Debug, Serialize, Deserialize)]
pub struct ScrapeRequest {
    /// Canonical app name or slug.
    pub app_name: String,
    /// Dashboard device identity; when present the cooldown gate is enforced.
    #[serde(default)]
    pub device_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScrapeResponse {
    pub scraped_count: u64,
    pub pages_fetched: u32,
    pub message: String,
}

/// Cooldown lookup query
#[derive(Debug, Deserialize)]
pub struct CooldownQuery {
    pub device_id: String,
    pub app_name: String,
}

/// Monitoring run request; absent app_name means "sweep all canonical apps".
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MonitoringRequest {
    #[serde(default)]
    pub app_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_serializes_without_data() {
        let resp = ApiResponse::<ScrapeResponse>::error("nope");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "nope");
        assert!(json.get("data").is_none());
        assert!(json["meta"]["request_id"].is_string());
    }

    #[test]
    fn error_envelope_can_carry_a_payload() {
        let resp = ApiResponse::error_with_data("cooldown active", 42u64);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "cooldown active");
        assert_eq!(json["data"], 42);
        assert!(json["meta"]["request_id"].is_string());
    }

    #[test]
    fn monitoring_request_defaults_to_sweep_all() {
        let req: MonitoringRequest = serde_json::from_str("{}").unwrap();
        assert!(req.app_name.is_none());
    }
}
