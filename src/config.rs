//! Configuration for provider clients
//!
//! Resolution priority per value: environment variable, then TOML config
//! file, then compiled default. Credentials come from the environment only;
//! a provider without credentials is constructed in mock mode rather than
//! failing at startup.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ServiceError, ServiceResult};

/// Token-bucket rate limit: `requests` per `window_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub requests: u32,
    pub window_secs: u64,
}

/// Request/retry settings shared by all provider clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSettings {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Initial backoff delay in milliseconds, doubled per attempt
    pub retry_delay_ms: u64,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

/// GDS provider settings (OAuth2 client-credentials flow).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GdsSettings {
    pub base_url: String,
    pub auth_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    #[serde(skip_serializing)]
    pub api_secret: Option<String>,
    #[serde(default)]
    pub request: RequestSettings,
    /// Default limit; search and analytics endpoints carry their own
    pub rate_limit: RateLimitSettings,
    pub search_rate_limit: RateLimitSettings,
    pub analytics_rate_limit: RateLimitSettings,
}

impl Default for GdsSettings {
    fn default() -> Self {
        Self {
            base_url: "https://test.api.gds.example.com".to_string(),
            auth_url: "https://test.api.gds.example.com/v1/security/oauth2/token".to_string(),
            api_key: None,
            api_secret: None,
            request: RequestSettings::default(),
            rate_limit: RateLimitSettings {
                requests: 20,
                window_secs: 1,
            },
            search_rate_limit: RateLimitSettings {
                requests: 10,
                window_secs: 1,
            },
            analytics_rate_limit: RateLimitSettings {
                requests: 5,
                window_secs: 1,
            },
        }
    }
}

/// Flight-tracker provider settings (access key in query string).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerSettings {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub request: RequestSettings,
    pub rate_limit: RateLimitSettings,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            base_url: "http://api.flighttracker.example.com/v1".to_string(),
            access_key: None,
            request: RequestSettings::default(),
            // Free tier: per-hour quota
            rate_limit: RateLimitSettings {
                requests: 500,
                window_secs: 3600,
            },
        }
    }
}

/// Travel-aggregator provider settings (key + host headers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorSettings {
    pub base_url: String,
    pub api_host: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub request: RequestSettings,
    pub rate_limit: RateLimitSettings,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            base_url: "https://flights.aggregator.example.com".to_string(),
            api_host: "flights.aggregator.example.com".to_string(),
            api_key: None,
            request: RequestSettings::default(),
            rate_limit: RateLimitSettings {
                requests: 50,
                window_secs: 60,
            },
        }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub gds: GdsSettings,
    #[serde(default)]
    pub tracker: TrackerSettings,
    #[serde(default)]
    pub aggregator: AggregatorSettings,
}

impl ServiceConfig {
    /// Resolve configuration: TOML file (when present) overlaid with
    /// environment variables, over compiled defaults.
    pub fn resolve(toml_path: Option<&Path>) -> ServiceResult<Self> {
        let mut config = match toml_path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    ServiceError::Validation(format!("read config {}: {}", path.display(), e))
                })?;
                let config: ServiceConfig = toml::from_str(&content).map_err(|e| {
                    ServiceError::Validation(format!("parse config {}: {}", path.display(), e))
                })?;
                info!(path = %path.display(), "Loaded TOML configuration");
                config
            }
            Some(path) => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                ServiceConfig::default()
            }
            None => ServiceConfig::default(),
        };

        config.apply_env();
        Ok(config)
    }

    /// Overlay credentials and base URLs from the environment.
    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("SKYMARKET_GDS_API_KEY") {
            self.gds.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("SKYMARKET_GDS_API_SECRET") {
            self.gds.api_secret = Some(v);
        }
        if let Ok(v) = std::env::var("SKYMARKET_GDS_BASE_URL") {
            self.gds.base_url = v;
        }
        if let Ok(v) = std::env::var("SKYMARKET_GDS_AUTH_URL") {
            self.gds.auth_url = v;
        }
        if let Ok(v) = std::env::var("SKYMARKET_TRACKER_ACCESS_KEY") {
            self.tracker.access_key = Some(v);
        }
        if let Ok(v) = std::env::var("SKYMARKET_TRACKER_BASE_URL") {
            self.tracker.base_url = v;
        }
        if let Ok(v) = std::env::var("SKYMARKET_AGGREGATOR_API_KEY") {
            self.aggregator.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("SKYMARKET_AGGREGATOR_BASE_URL") {
            self.aggregator.base_url = v;
        }
        if let Ok(v) = std::env::var("SKYMARKET_AGGREGATOR_HOST") {
            self.aggregator.api_host = v;
        }
    }

    /// True when the GDS client has a usable credential pair.
    pub fn gds_configured(&self) -> bool {
        is_valid_key(self.gds.api_key.as_deref()) && is_valid_key(self.gds.api_secret.as_deref())
    }

    pub fn tracker_configured(&self) -> bool {
        is_valid_key(self.tracker.access_key.as_deref())
    }

    pub fn aggregator_configured(&self) -> bool {
        is_valid_key(self.aggregator.api_key.as_deref())
    }
}

/// Validate a key: present, non-empty, non-whitespace.
fn is_valid_key(key: Option<&str>) -> bool {
    key.is_some_and(|k| !k.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_per_endpoint_gds_limits() {
        let config = ServiceConfig::default();
        assert_eq!(config.gds.search_rate_limit.requests, 10);
        assert_eq!(config.gds.analytics_rate_limit.requests, 5);
        assert_eq!(config.gds.rate_limit.requests, 20);
    }

    #[test]
    fn missing_credentials_mean_not_configured() {
        let config = ServiceConfig::default();
        assert!(!config.gds_configured());
        assert!(!config.tracker_configured());
        assert!(!config.aggregator_configured());

        let mut config = ServiceConfig::default();
        config.gds.api_key = Some("key".into());
        // Secret still missing
        assert!(!config.gds_configured());
        config.gds.api_secret = Some("secret".into());
        assert!(config.gds_configured());
    }

    #[test]
    fn whitespace_keys_are_invalid() {
        assert!(!is_valid_key(Some("   ")));
        assert!(!is_valid_key(Some("")));
        assert!(!is_valid_key(None));
        assert!(is_valid_key(Some("abc")));
    }

    #[test]
    fn toml_overrides_defaults() {
        let toml = r#"
            [tracker]
            base_url = "http://localhost:9999/v1"
            rate_limit = { requests = 10, window_secs = 60 }
        "#;
        let config: ServiceConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.tracker.base_url, "http://localhost:9999/v1");
        assert_eq!(config.tracker.rate_limit.requests, 10);
        // Untouched sections keep defaults
        assert_eq!(config.gds.rate_limit.requests, 20);
    }
}
