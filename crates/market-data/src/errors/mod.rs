//! Error types for the market data crate.
//!
//! Provider fetches return `Result<Option<T>, MarketDataError>`: `Ok(None)` is
//! an ordinary "no data" answer, an `Err` is a transport, protocol or
//! programming failure. The router treats both as a failed attempt but logs
//! them differently.

use thiserror::Error;

/// Errors that can occur during market data operations.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// No API key is configured for a provider that needs one.
    #[error("Missing API key for provider: {provider}")]
    MissingCredential {
        /// The provider without a credential
        provider: String,
    },

    /// The provider rate limited the request (HTTP 429).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The provider rejected our credentials (HTTP 401).
    #[error("Unauthorized: {provider}")]
    Unauthorized {
        /// The provider that rejected the key
        provider: String,
    },

    /// The provider reports the API quota as used up.
    #[error("Quota exhausted: {provider}")]
    QuotaExhausted {
        /// The provider whose quota ran out
        provider: String,
    },

    /// A provider-specific error occurred (non-2xx status, API error body).
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The provider answered with a body we could not interpret.
    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse {
        /// The provider that sent the response
        provider: String,
        /// What was wrong with it
        message: String,
    },

    /// The provider does not implement the requested operation.
    #[error("Operation '{operation}' not supported by {provider}")]
    NotSupported {
        /// The operation requested
        operation: String,
        /// The provider that lacks it
        provider: String,
    },

    /// A data type that needs a symbol was requested without one.
    #[error("Symbol required for {data_type} request")]
    SymbolRequired {
        /// The data type requested
        data_type: String,
    },

    /// The request names a data type no provider can serve.
    #[error("Unsupported data type: {0}")]
    UnknownDataType(String),

    /// A request parameter could not be parsed.
    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Why it was rejected
        message: String,
    },

    /// The named provider is not registered.
    #[error("Provider '{0}' not found")]
    ProviderNotFound(String),

    /// No providers are available to handle the request.
    #[error("No available providers for {data_type}")]
    NoProvidersAvailable {
        /// The data type requested
        data_type: String,
    },

    /// All candidate providers were tried and all failed.
    #[error("Failed to get {data_type} from all available providers")]
    AllProvidersFailed {
        /// The data type requested
        data_type: String,
    },

    /// The caller's deadline passed before any provider answered.
    #[error("Deadline exceeded while fetching {data_type}")]
    DeadlineExceeded {
        /// The data type requested
        data_type: String,
    },

    /// The API key store could not be read.
    #[error("Key store error: {0}")]
    KeyStore(String),

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketDataError {
    /// Whether this error should clear the provider's availability flag.
    ///
    /// Only failures that will keep happening until an operator intervenes
    /// (bad credentials, exhausted quota) take a provider out of rotation on
    /// their own. Everything else just counts towards the error thresholds.
    pub fn marks_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized { .. } | Self::QuotaExhausted { .. }
        )
    }

    /// Whether this is one of the router's definitive, request-level failures.
    pub fn is_definitive(&self) -> bool {
        matches!(
            self,
            Self::NoProvidersAvailable { .. }
                | Self::AllProvidersFailed { .. }
                | Self::DeadlineExceeded { .. }
        )
    }

    pub(crate) fn provider_error(provider: &str, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_response(provider: &str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn not_supported(provider: &str, operation: &str) -> Self {
        Self::NotSupported {
            operation: operation.to_string(),
            provider: provider.to_string(),
        }
    }
}
