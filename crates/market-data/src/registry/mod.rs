//! Provider registry module.
//!
//! This module holds everything the router consults before calling a
//! provider:
//! - Provider registration with per-provider configuration
//! - Consecutive-error counting and cooldowns
//! - The routing table
//! - Skip/attempt diagnostics

mod health;
mod provider_registry;
mod routing;
mod skip_reason;

pub use health::{CooldownCheck, CooldownTracker};
pub use provider_registry::{
    ProviderConfig, ProviderRegistry, DEFAULT_COOLDOWN_MINUTES, DEFAULT_MAX_ERRORS, KNOWN_PROVIDERS,
};
pub use routing::{RoutingRule, RoutingTable};
pub use skip_reason::{AttemptOutcome, FetchDiagnostics, ProviderAttempt, SkipReason};
