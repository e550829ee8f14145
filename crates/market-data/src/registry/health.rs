//! Consecutive-error counting and cooldowns.
//!
//! The router records every failed attempt here. Once a provider reaches its
//! error threshold it is put in cooldown until a resume instant; while the
//! cooldown lasts the provider is excluded from candidate lists.
//!
//! Expiry is lazy: the first availability check after the resume instant
//! drops the cooldown and zeroes the counter (half-open re-admission). The
//! caller is told so it can restore the provider's own health counters.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};

use crate::clock::Clock;

#[derive(Debug, Default)]
struct Health {
    consecutive_errors: u32,
    cooldown_until: Option<DateTime<Utc>>,
}

/// Answer to "may this provider be tried right now?".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CooldownCheck {
    /// Never cooled down, or already re-admitted.
    Clear,
    /// Still cooling down.
    Active { until: DateTime<Utc> },
    /// The cooldown ended during this check; counters were zeroed.
    Expired,
}

impl CooldownCheck {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

/// Tracks consecutive errors and cooldowns for every provider.
///
/// In-memory only; state is lost on restart.
pub struct CooldownTracker {
    entries: Mutex<HashMap<String, Health>>,
    clock: Arc<dyn Clock>,
}

impl CooldownTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, Health>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("Cooldown tracker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Count a failed attempt. Reaching `max_errors` starts a cooldown of
    /// `cooldown_minutes` from now.
    pub fn record_failure(&self, provider: &str, max_errors: u32, cooldown_minutes: u32) {
        let now = self.clock.now();
        let mut entries = self.lock_entries();
        let health = entries.entry(provider.to_string()).or_default();

        health.consecutive_errors = health.consecutive_errors.saturating_add(1);

        if health.consecutive_errors >= max_errors && health.cooldown_until.is_none() {
            let until = now + Duration::minutes(i64::from(cooldown_minutes));
            health.cooldown_until = Some(until);
            warn!(
                "Provider '{}' reached {} consecutive errors, cooling down until {}",
                provider, health.consecutive_errors, until
            );
        } else {
            debug!(
                "Provider '{}' error {}/{}",
                provider, health.consecutive_errors, max_errors
            );
        }
    }

    /// Zero the consecutive-error counter after a successful fetch.
    pub fn record_success(&self, provider: &str) {
        let mut entries = self.lock_entries();
        if let Some(health) = entries.get_mut(provider) {
            if health.consecutive_errors > 0 {
                debug!("Provider '{}' succeeded, error count reset", provider);
            }
            health.consecutive_errors = 0;
        }
    }

    /// Check the cooldown, re-admitting the provider if it has passed.
    pub fn check(&self, provider: &str) -> CooldownCheck {
        let now = self.clock.now();
        let mut entries = self.lock_entries();

        let Some(health) = entries.get_mut(provider) else {
            return CooldownCheck::Clear;
        };

        match health.cooldown_until {
            None => CooldownCheck::Clear,
            Some(until) if now < until => CooldownCheck::Active { until },
            Some(_) => {
                info!("Cooldown for '{}' has ended, provider re-admitted", provider);
                health.cooldown_until = None;
                health.consecutive_errors = 0;
                CooldownCheck::Expired
            }
        }
    }

    /// Whether the provider is cooling down right now. Does not re-admit.
    pub fn in_cooldown(&self, provider: &str) -> bool {
        let now = self.clock.now();
        self.lock_entries()
            .get(provider)
            .and_then(|h| h.cooldown_until)
            .is_some_and(|until| now < until)
    }

    pub fn consecutive_errors(&self, provider: &str) -> u32 {
        self.lock_entries()
            .get(provider)
            .map(|h| h.consecutive_errors)
            .unwrap_or(0)
    }

    pub fn cooldown_until(&self, provider: &str) -> Option<DateTime<Utc>> {
        self.lock_entries().get(provider).and_then(|h| h.cooldown_until)
    }

    /// Clear the counter and cooldown for one provider.
    pub fn reset(&self, provider: &str) {
        if self.lock_entries().remove(provider).is_some() {
            info!("Reset error count and cooldown for '{}'", provider);
        }
    }

    pub fn reset_all(&self) {
        self.lock_entries().clear();
        info!("Reset error counts and cooldowns for all providers");
    }
}
