//! Skip reason tracking for candidate selection diagnostics.

use std::fmt;

use chrono::{DateTime, Utc};

/// Why a provider named by a routing rule was not tried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// No provider is registered under this name.
    NotRegistered,

    /// Registered but switched off by an operator.
    Disabled,

    /// Cooling down after repeated failures.
    CoolingDown { until: DateTime<Utc> },

    /// Consecutive errors at or above the configured maximum.
    TooManyErrors { count: u32, max: u32 },

    /// The provider's own status reports it unhealthy.
    Unhealthy,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRegistered => write!(f, "not registered"),
            Self::Disabled => write!(f, "disabled"),
            Self::CoolingDown { until } => write!(f, "cooling down until {}", until),
            Self::TooManyErrors { count, max } => write!(f, "{} consecutive errors (max {})", count, max),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// What happened to one provider attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    Skipped(SkipReason),
    NoData,
    Error(String),
    Success,
}

/// Record of a single provider attempt during a fetch.
#[derive(Clone, Debug)]
pub struct ProviderAttempt {
    pub provider: String,
    pub outcome: AttemptOutcome,
}

/// Every skip and attempt made for one request, in order.
#[derive(Clone, Debug, Default)]
pub struct FetchDiagnostics {
    pub attempts: Vec<ProviderAttempt>,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, provider: &str, outcome: AttemptOutcome) {
        self.attempts.push(ProviderAttempt {
            provider: provider.to_string(),
            outcome,
        });
    }

    pub fn record_skip(&mut self, provider: &str, reason: SkipReason) {
        self.push(provider, AttemptOutcome::Skipped(reason));
    }

    pub fn record_no_data(&mut self, provider: &str) {
        self.push(provider, AttemptOutcome::NoData);
    }

    pub fn record_error(&mut self, provider: &str, error: String) {
        self.push(provider, AttemptOutcome::Error(error));
    }

    pub fn record_success(&mut self, provider: &str) {
        self.push(provider, AttemptOutcome::Success);
    }

    /// Summary for logging/debugging.
    pub fn summary(&self) -> String {
        if self.attempts.is_empty() {
            return "no candidates".to_string();
        }
        self.attempts
            .iter()
            .map(|a| match &a.outcome {
                AttemptOutcome::Success => format!("{}: SUCCESS", a.provider),
                AttemptOutcome::NoData => format!("{}: NO DATA", a.provider),
                AttemptOutcome::Skipped(reason) => format!("{}: SKIPPED ({})", a.provider, reason),
                AttemptOutcome::Error(err) => format!("{}: ERROR ({})", a.provider, err),
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    pub fn has_success(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| a.outcome == AttemptOutcome::Success)
    }

    /// Attempts that reached the provider (skips excluded).
    pub fn attempt_count(&self, provider: &str) -> usize {
        self.attempts
            .iter()
            .filter(|a| a.provider == provider && !matches!(a.outcome, AttemptOutcome::Skipped(_)))
            .count()
    }

    pub fn skip_reasons(&self) -> Vec<(&str, &SkipReason)> {
        self.attempts
            .iter()
            .filter_map(|a| match &a.outcome {
                AttemptOutcome::Skipped(reason) => Some((a.provider.as_str(), reason)),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<(&str, &str)> {
        self.attempts
            .iter()
            .filter_map(|a| match &a.outcome {
                AttemptOutcome::Error(e) => Some((a.provider.as_str(), e.as_str())),
                _ => None,
            })
            .collect()
    }
}
