//! Resilient request executor
//!
//! Shared retry/backoff/rate-limit logic used by every provider client.
//! Each client owns its own executor instance, so rate-limit counters are
//! per-client state and are never shared across instances.

use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::{RateLimitSettings, RequestSettings};
use crate::error::ProviderError;

/// Token-bucket rate limiter: `limit` requests per `window`.
///
/// When the window's budget is spent, `acquire` sleeps until the window
/// rolls over, then grants the request. Callers sharing one limiter are
/// serialized through the internal mutex.
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    state: Mutex<WindowState>,
}

struct WindowState {
    count: u32,
    window_start: Option<Instant>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            state: Mutex::new(WindowState {
                count: 0,
                window_start: None,
            }),
        }
    }

    pub fn from_settings(settings: RateLimitSettings) -> Self {
        Self::new(settings.requests, Duration::from_secs(settings.window_secs))
    }

    /// Take one token, waiting for the next window if the budget is spent.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        match state.window_start {
            Some(start) if now.duration_since(start) < self.window => {
                if state.count >= self.limit {
                    let wait = self.window - now.duration_since(start);
                    debug!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting for window");
                    tokio::time::sleep(wait).await;
                    state.window_start = Some(Instant::now());
                    state.count = 1;
                } else {
                    state.count += 1;
                }
            }
            _ => {
                state.window_start = Some(now);
                state.count = 1;
            }
        }
    }
}

/// Retry schedule: `max_retries` retries with `base_delay * 2^attempt` backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &RequestSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.retry_delay_ms),
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Executes HTTP requests against one provider with timeout, retries,
/// exponential backoff and token-bucket rate limiting.
///
/// Per-endpoint limiter overrides are matched by longest path prefix, so a
/// provider with different quotas for search and analytics calls enforces
/// both through one executor.
pub struct RequestExecutor {
    http: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
    default_limiter: RateLimiter,
    endpoint_limiters: Vec<(String, RateLimiter)>,
}

const USER_AGENT: &str = concat!("skymarket/", env!("CARGO_PKG_VERSION"));

impl RequestExecutor {
    pub fn new(
        base_url: &str,
        request: &RequestSettings,
        rate_limit: RateLimitSettings,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(request.timeout_secs))
            .build()
            .map_err(|e| ProviderError::RequestFailure {
                status: 0,
                body: format!("HTTP client construction failed: {}", e),
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            policy: RetryPolicy::from_settings(request),
            default_limiter: RateLimiter::from_settings(rate_limit),
            endpoint_limiters: Vec::new(),
        })
    }

    /// Register a limiter for every endpoint starting with `prefix`.
    pub fn with_endpoint_limit(mut self, prefix: &str, settings: RateLimitSettings) -> Self {
        self.endpoint_limiters
            .push((prefix.to_string(), RateLimiter::from_settings(settings)));
        // Longest prefix first so the most specific match wins
        self.endpoint_limiters
            .sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        self
    }

    fn limiter_for(&self, endpoint: &str) -> &RateLimiter {
        self.endpoint_limiters
            .iter()
            .find(|(prefix, _)| endpoint.starts_with(prefix.as_str()))
            .map(|(_, limiter)| limiter)
            .unwrap_or(&self.default_limiter)
    }

    /// GET `base_url + endpoint` and parse the body as JSON.
    pub async fn get_json(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
    ) -> Result<Value, ProviderError> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        self.execute(Method::GET, &url, endpoint, query, headers, None)
            .await
    }

    /// POST a urlencoded form to an absolute URL (OAuth token endpoints live
    /// on their own host). Uses the default limiter.
    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, String)],
    ) -> Result<Value, ProviderError> {
        self.execute(Method::POST, url, "", &[], &[], Some(form))
            .await
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        endpoint: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
        form: Option<&[(&str, String)]>,
    ) -> Result<Value, ProviderError> {
        let limiter = self.limiter_for(endpoint);
        let mut last_error: Option<ProviderError> = None;

        for attempt in 0..=self.policy.max_retries {
            limiter.acquire().await;

            debug!(
                %method,
                url,
                attempt = attempt + 1,
                max_attempts = self.policy.max_retries + 1,
                "Issuing provider request"
            );

            let mut request = self.http.request(method.clone(), url);
            if !query.is_empty() {
                request = request.query(query);
            }
            for (name, value) in headers {
                request = request.header(*name, value);
            }
            if let Some(form) = form {
                request = request.form(form);
            }

            let error = match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.as_u16() == 429 {
                        let retry_after = response
                            .headers()
                            .get("Retry-After")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok());
                        ProviderError::RateLimitExceeded { retry_after }
                    } else if !status.is_success() {
                        let body = response.text().await.unwrap_or_default();
                        ProviderError::RequestFailure {
                            status: status.as_u16(),
                            body,
                        }
                    } else {
                        // Malformed bodies are not retried: the server answered,
                        // it just did not speak JSON.
                        return response
                            .json::<Value>()
                            .await
                            .map_err(|e| ProviderError::ParseFailure(e.to_string()));
                    }
                }
                // Transport failures (timeouts included) are retryable;
                // status 0 marks the absence of an HTTP response.
                Err(e) => ProviderError::RequestFailure {
                    status: 0,
                    body: e.to_string(),
                },
            };

            if attempt >= self.policy.max_retries {
                last_error = Some(error);
                break;
            }

            // 429 honors the server-declared delay when present
            let delay = match &error {
                ProviderError::RateLimitExceeded {
                    retry_after: Some(secs),
                } => Duration::from_secs(*secs),
                _ => self.policy.backoff_delay(attempt),
            };

            warn!(
                url,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Provider request failed, retrying"
            );

            last_error = Some(error);
            tokio::time::sleep(delay).await;
        }

        Err(last_error.unwrap_or(ProviderError::RequestFailure {
            status: 0,
            body: "retry budget exhausted without a recorded error".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};

    /// Bind a stub provider on an ephemeral port and return its base URL.
    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn fast_retry_executor(base_url: &str) -> RequestExecutor {
        RequestExecutor::new(
            base_url,
            &RequestSettings {
                timeout_secs: 5,
                max_retries: 3,
                retry_delay_ms: 10,
            },
            RateLimitSettings {
                requests: 100,
                window_secs: 1,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn retries_server_errors_until_success() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/data",
            get(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        (StatusCode::INTERNAL_SERVER_ERROR, "upstream down").into_response()
                    } else {
                        Json(serde_json::json!({ "ok": true })).into_response()
                    }
                }
            }),
        );
        let base_url = serve(app).await;

        let executor = fast_retry_executor(&base_url);
        let body = executor.get_json("/data", &[], &[]).await.unwrap();

        assert_eq!(body["ok"], serde_json::json!(true));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rate_limited_response_honors_retry_after() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/data",
            get(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        (
                            StatusCode::TOO_MANY_REQUESTS,
                            [("Retry-After", "1")],
                            "slow down",
                        )
                            .into_response()
                    } else {
                        Json(serde_json::json!({ "ok": true })).into_response()
                    }
                }
            }),
        );
        let base_url = serve(app).await;

        let executor = fast_retry_executor(&base_url);
        let start = Instant::now();
        let body = executor.get_json("/data", &[], &[]).await.unwrap();

        // The 10ms backoff schedule cannot explain a ~1s pause; only the
        // server-declared Retry-After can.
        assert!(start.elapsed() >= Duration::from_millis(900));
        assert_eq!(body["ok"], serde_json::json!(true));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn malformed_body_fails_without_retrying() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/data",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    "<html>definitely not json</html>"
                }
            }),
        );
        let base_url = serve(app).await;

        let executor = fast_retry_executor(&base_url);
        let error = executor.get_json("/data", &[], &[]).await.unwrap_err();

        assert!(matches!(error, ProviderError::ParseFailure(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_budget_reports_last_failure() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/data",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::SERVICE_UNAVAILABLE, "maintenance")
                }
            }),
        );
        let base_url = serve(app).await;

        let executor = fast_retry_executor(&base_url);
        let error = executor.get_json("/data", &[], &[]).await.unwrap_err();

        match error {
            ProviderError::RequestFailure { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("expected RequestFailure, got {:?}", other),
        }
        // Initial attempt plus three retries
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn rate_limiter_grants_within_budget_immediately() {
        let limiter = RateLimiter::new(3, Duration::from_secs(5));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn rate_limiter_blocks_request_over_budget() {
        let limiter = RateLimiter::new(2, Duration::from_millis(500));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        // Third call must wait for the window to roll over
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(450));
    }

    #[tokio::test]
    async fn endpoint_limiter_longest_prefix_wins() {
        let executor = RequestExecutor::new(
            "http://localhost",
            &RequestSettings::default(),
            RateLimitSettings {
                requests: 100,
                window_secs: 1,
            },
        )
        .unwrap()
        .with_endpoint_limit(
            "/v2/shopping",
            RateLimitSettings {
                requests: 10,
                window_secs: 1,
            },
        )
        .with_endpoint_limit(
            "/v2/shopping/flight-offers",
            RateLimitSettings {
                requests: 5,
                window_secs: 1,
            },
        );

        let limiter = executor.limiter_for("/v2/shopping/flight-offers");
        assert_eq!(limiter.limit, 5);
        let limiter = executor.limiter_for("/v2/shopping/availability");
        assert_eq!(limiter.limit, 10);
        let limiter = executor.limiter_for("/v1/airports");
        assert_eq!(limiter.limit, 100);
    }
}
