//! Error types for skymarket
//!
//! Two layers: `ProviderError` for anything that goes wrong talking to a
//! single data provider (caught at the orchestrator boundary and converted
//! into fallback transitions), and `ServiceError` for failures that are
//! allowed to reach the caller.

use thiserror::Error;

/// Errors raised by a single provider client.
///
/// None of these escape the fallback orchestrator; they drive the transition
/// to the next configured source.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Missing or rejected credentials. Fatal for this provider, immediate fallback.
    #[error("Authentication failed: {0}")]
    AuthenticationFailure(String),

    /// HTTP 429. Carries the server-declared retry delay in seconds if present.
    #[error("Rate limit exceeded{}", retry_after.map(|s| format!(", retry after {}s", s)).unwrap_or_default())]
    RateLimitExceeded { retry_after: Option<u64> },

    /// Non-429 4xx/5xx, or transport failure after retries were exhausted.
    #[error("Request failed with status {status}: {body}")]
    RequestFailure { status: u16, body: String },

    /// Response body could not be parsed. Not retried.
    #[error("Parse error: {0}")]
    ParseFailure(String),
}

/// Errors surfaced to callers of the data service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Bad caller input. No fallback is attempted.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Every source including the synthetic generator failed. Should never
    /// happen in practice; surfaces as a 503-class failure upstream.
    #[error("No data available: {0}")]
    DataUnavailable(String),

    /// Demand model training, persistence or inference failed.
    #[error("Model error: {0}")]
    Model(String),
}

/// Result alias for service-level operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_error_formats_retry_after() {
        let err = ProviderError::RateLimitExceeded {
            retry_after: Some(30),
        };
        assert_eq!(err.to_string(), "Rate limit exceeded, retry after 30s");

        let err = ProviderError::RateLimitExceeded { retry_after: None };
        assert_eq!(err.to_string(), "Rate limit exceeded");
    }

    #[test]
    fn request_failure_carries_status_and_body() {
        let err = ProviderError::RequestFailure {
            status: 502,
            body: "bad gateway".into(),
        };
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("bad gateway"));
    }
}
