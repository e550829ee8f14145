use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cumulative errors at which a provider stops reporting healthy.
pub const HEALTHY_ERROR_LIMIT: u32 = 5;

/// Quota usage (percent) at which a provider stops reporting healthy.
pub const HEALTHY_QUOTA_LIMIT_PERCENT: f64 = 95.0;

/// Live health and request counters for one provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub is_available: bool,
    pub last_request: Option<DateTime<Utc>>,
    pub request_count: u64,
    pub error_count: u32,
    pub last_error: Option<String>,
    pub quota_remaining: Option<u64>,
    pub quota_limit: Option<u64>,
}

impl Default for ProviderStatus {
    fn default() -> Self {
        Self {
            is_available: true,
            last_request: None,
            request_count: 0,
            error_count: 0,
            last_error: None,
            quota_remaining: None,
            quota_limit: None,
        }
    }
}

impl ProviderStatus {
    /// Percentage of the quota already spent, 0 when the provider reports none.
    pub fn quota_usage_percent(&self) -> f64 {
        match (self.quota_limit, self.quota_remaining) {
            (Some(limit), Some(remaining)) if limit > 0 => {
                let used = limit.saturating_sub(remaining);
                used as f64 / limit as f64 * 100.0
            }
            _ => 0.0,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.is_available
            && self.error_count < HEALTHY_ERROR_LIMIT
            && self.quota_usage_percent() < HEALTHY_QUOTA_LIMIT_PERCENT
    }

    /// A request completed, with or without data.
    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.last_request = Some(at);
        self.request_count += 1;
        self.is_available = true;
    }

    pub fn record_failure(&mut self, at: DateTime<Utc>, message: String, marks_unavailable: bool) {
        self.last_request = Some(at);
        self.request_count += 1;
        self.error_count += 1;
        self.last_error = Some(message);
        if marks_unavailable {
            self.is_available = false;
        }
    }

    pub fn update_quota(&mut self, remaining: Option<u64>, limit: Option<u64>) {
        if remaining.is_some() {
            self.quota_remaining = remaining;
        }
        if limit.is_some() {
            self.quota_limit = limit;
        }
    }

    /// Clear error state but keep request telemetry.
    pub fn reset_health(&mut self) {
        self.is_available = true;
        self.error_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_healthy() {
        let status = ProviderStatus::default();
        assert!(status.is_healthy());
        assert_eq!(status.quota_usage_percent(), 0.0);
    }

    #[test]
    fn test_quota_usage_percent() {
        let status = ProviderStatus {
            quota_remaining: Some(25),
            quota_limit: Some(100),
            ..Default::default()
        };
        assert_eq!(status.quota_usage_percent(), 75.0);
        assert!(status.is_healthy());

        let status = ProviderStatus {
            quota_remaining: Some(4),
            quota_limit: Some(100),
            ..Default::default()
        };
        assert_eq!(status.quota_usage_percent(), 96.0);
        assert!(!status.is_healthy());
    }

    #[test]
    fn test_quota_without_limit_is_zero() {
        let status = ProviderStatus {
            quota_remaining: Some(3),
            quota_limit: None,
            ..Default::default()
        };
        assert_eq!(status.quota_usage_percent(), 0.0);
    }

    #[test]
    fn test_unhealthy_after_error_limit() {
        let mut status = ProviderStatus::default();
        for _ in 0..HEALTHY_ERROR_LIMIT - 1 {
            status.record_failure(Utc::now(), "boom".to_string(), false);
        }
        assert!(status.is_healthy());

        status.record_failure(Utc::now(), "boom".to_string(), false);
        assert!(!status.is_healthy());
        assert_eq!(status.request_count, HEALTHY_ERROR_LIMIT as u64);
        assert_eq!(status.last_error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_unavailable_until_success() {
        let mut status = ProviderStatus::default();
        status.record_failure(Utc::now(), "401".to_string(), true);
        assert!(!status.is_healthy());

        status.record_success(Utc::now());
        assert!(status.is_healthy());
        assert_eq!(status.error_count, 1);
    }

    #[test]
    fn test_reset_health_keeps_request_count() {
        let mut status = ProviderStatus::default();
        for _ in 0..6 {
            status.record_failure(Utc::now(), "boom".to_string(), true);
        }
        status.reset_health();
        assert!(status.is_healthy());
        assert_eq!(status.request_count, 6);
    }
}
