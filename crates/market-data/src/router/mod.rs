//! Request routing across providers.

mod data_router;
mod settings;

pub use data_router::{DataRouter, ProviderStatusReport};
pub use settings::{RouterSettings, DEFAULT_ATTEMPT_TIMEOUT_SECS};
