//! Shared HTTP plumbing for the service clients.
//!
//! All three upstream services speak the same dialect: JSON POST bodies,
//! JSON responses, 5xx/429 for transient failure. Each client holds a
//! [`ServiceConfig`] and funnels its calls through [`post_json`].

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{AiError, AiResult};

/// Base delay before the first retry; doubles per attempt.
const RETRY_BASE_MS: u64 = 500;

const DEFAULT_MAX_RETRIES: u32 = 2;

/// Connection settings for one upstream service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base URL of the service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries for retryable failures
    pub max_retries: u32,
}

impl ServiceConfig {
    /// Read `{prefix}_URL`, `{prefix}_TIMEOUT` and `{prefix}_RETRIES`.
    pub fn from_env(prefix: &str, default_url: &str, default_timeout_secs: u64) -> Self {
        Self {
            base_url: env_var(prefix, "URL").unwrap_or_else(|| default_url.to_string()),
            timeout: Duration::from_secs(
                env_var(prefix, "TIMEOUT")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(default_timeout_secs),
            ),
            max_retries: env_var(prefix, "RETRIES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_RETRIES),
        }
    }

    /// Build the HTTP client this config describes.
    pub(crate) fn http_client(&self) -> AiResult<Client> {
        Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(AiError::Network)
    }
}

fn env_var(prefix: &str, suffix: &str) -> Option<String> {
    std::env::var(format!("{}_{}", prefix, suffix)).ok()
}

/// POST a JSON payload and decode the JSON response.
///
/// Transient failures (connect errors, 429, 5xx) are retried up to
/// `config.max_retries` times with exponential backoff.
pub(crate) async fn post_json<Req, Resp>(
    http: &Client,
    config: &ServiceConfig,
    service: &'static str,
    path: &str,
    request: &Req,
) -> AiResult<Resp>
where
    Req: Serialize,
    Resp: DeserializeOwned,
{
    let url = format!("{}{}", config.base_url, path);

    debug!("POST {}", url);

    let response = with_retry(config.max_retries, service, || async {
        let response = http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(AiError::Network)?;
        check_status(service, response).await
    })
    .await?;

    let decoded = response.json::<Resp>().await?;
    Ok(decoded)
}

/// Check if a service is reachable and reporting healthy.
pub(crate) async fn health_check(http: &Client, config: &ServiceConfig, service: &str) -> bool {
    let url = format!("{}/health", config.base_url);

    match http.get(&url).send().await {
        Ok(response) if response.status().is_success() => true,
        Ok(response) => {
            warn!("{} health check failed: {}", service, response.status());
            false
        }
        Err(e) => {
            warn!("{} health check error: {}", service, e);
            false
        }
    }
}

async fn check_status(service: &'static str, response: Response) -> AiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = format!("{} returned {}: {}", service, status, body);
    if status.as_u16() == 429 || status.is_server_error() {
        Err(AiError::ServiceUnavailable(message))
    } else {
        Err(AiError::RequestFailed(message))
    }
}

/// Execute with retry logic.
async fn with_retry<F, Fut, T>(max_retries: u32, service: &'static str, operation: F) -> AiResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = AiResult<T>>,
{
    let mut last_error = None;

    for attempt in 0..=max_retries {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                let delay = Duration::from_millis(RETRY_BASE_MS * 2u64.pow(attempt));
                warn!(
                    "{} request failed (attempt {}), retrying in {:?}: {}",
                    service,
                    attempt + 1,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error
        .unwrap_or_else(|| AiError::RequestFailed(format!("{}: unknown error", service))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use wiremock::matchers::{method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Serialize)]
    struct Ping {
        n: u32,
    }

    #[derive(Debug, Deserialize)]
    struct Pong {
        n: u32,
    }

    fn config_for(server: &MockServer, max_retries: u32) -> ServiceConfig {
        ServiceConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
            max_retries,
        }
    }

    #[test]
    fn test_from_env_defaults() {
        let config = ServiceConfig::from_env("AI_CLIENT_TEST_NONE", "http://localhost:9", 7);
        assert_eq!(config.base_url, "http://localhost:9");
        assert_eq!(config.timeout, Duration::from_secs(7));
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn test_from_env_overrides() {
        std::env::set_var("AI_CLIENT_TEST_SET_URL", "http://svc:8000");
        std::env::set_var("AI_CLIENT_TEST_SET_TIMEOUT", "11");
        std::env::set_var("AI_CLIENT_TEST_SET_RETRIES", "4");

        let config = ServiceConfig::from_env("AI_CLIENT_TEST_SET", "http://localhost:9", 7);
        assert_eq!(config.base_url, "http://svc:8000");
        assert_eq!(config.timeout, Duration::from_secs(11));
        assert_eq!(config.max_retries, 4);

        std::env::remove_var("AI_CLIENT_TEST_SET_URL");
        std::env::remove_var("AI_CLIENT_TEST_SET_TIMEOUT");
        std::env::remove_var("AI_CLIENT_TEST_SET_RETRIES");
    }

    #[test]
    fn test_from_env_invalid_numbers_fall_back() {
        std::env::set_var("AI_CLIENT_TEST_BAD_TIMEOUT", "soon");
        std::env::set_var("AI_CLIENT_TEST_BAD_RETRIES", "-1");

        let config = ServiceConfig::from_env("AI_CLIENT_TEST_BAD", "http://localhost:9", 7);
        assert_eq!(config.timeout, Duration::from_secs(7));
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);

        std::env::remove_var("AI_CLIENT_TEST_BAD_TIMEOUT");
        std::env::remove_var("AI_CLIENT_TEST_BAD_RETRIES");
    }

    #[tokio::test]
    async fn test_post_json_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(url_path("/api/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"n": 3})))
            .expect(1)
            .mount(&server)
            .await;

        let config = config_for(&server, 0);
        let http = config.http_client().unwrap();
        let pong: Pong = post_json(&http, &config, "test", "/api/ping", &Ping { n: 3 })
            .await
            .unwrap();
        assert_eq!(pong.n, 3);
    }

    #[tokio::test]
    async fn test_post_json_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(url_path("/api/ping"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(url_path("/api/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"n": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let config = config_for(&server, 2);
        let http = config.http_client().unwrap();
        let pong: Pong = post_json(&http, &config, "test", "/api/ping", &Ping { n: 1 })
            .await
            .unwrap();
        assert_eq!(pong.n, 1);
    }

    #[tokio::test]
    async fn test_post_json_does_not_retry_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(url_path("/api/ping"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad count"))
            .expect(1)
            .mount(&server)
            .await;

        let config = config_for(&server, 3);
        let http = config.http_client().unwrap();
        let result: AiResult<Pong> =
            post_json(&http, &config, "test", "/api/ping", &Ping { n: 0 }).await;

        match result {
            Err(AiError::RequestFailed(message)) => {
                assert!(message.contains("400"));
                assert!(message.contains("bad count"));
            }
            other => panic!("expected RequestFailed, got {:?}", other.map(|p| p.n)),
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let config = config_for(&server, 0);
        let http = config.http_client().unwrap();
        assert!(health_check(&http, &config, "test").await);
    }
}
