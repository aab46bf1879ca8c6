//! Transactional email over the mail provider's HTTP API.
//!
//! The engine never renders email bodies itself; it names a template and
//! hands over variables, and the provider does the rest.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::error::{NotifyError, NotifyResult};

/// Transactional templates the engine sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmailTemplate {
    SubscriptionExpired,
    LimitReached,
    ProcessingStarted,
    VideoGenerated,
    ScheduleComplete,
}

impl EmailTemplate {
    /// Template id at the mail provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailTemplate::SubscriptionExpired => "subscription_expired",
            EmailTemplate::LimitReached => "limit_reached",
            EmailTemplate::ProcessingStarted => "processing_started",
            EmailTemplate::VideoGenerated => "video_generated",
            EmailTemplate::ScheduleComplete => "schedule_complete",
        }
    }
}

/// Mailer configuration.
#[derive(Debug, Clone)]
pub struct MailerConfig {
    /// Base URL of the mail provider API
    pub base_url: String,
    /// Bearer token, when the provider requires one
    pub api_key: Option<String>,
    /// From address on outgoing mail
    pub from: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8040".to_string(),
            api_key: None,
            from: "PropReel <no-reply@propreel.app>".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl MailerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("MAILER_URL").unwrap_or(defaults.base_url),
            api_key: std::env::var("MAILER_API_KEY").ok(),
            from: std::env::var("MAILER_FROM").unwrap_or(defaults.from),
            timeout: Duration::from_secs(
                std::env::var("MAILER_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
        }
    }
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a str,
    template: &'static str,
    variables: serde_json::Value,
}

/// Client for the transactional mail API.
pub struct Mailer {
    http: Client,
    config: MailerConfig,
}

impl Mailer {
    /// Create a new mailer.
    pub fn new(config: MailerConfig) -> NotifyResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(NotifyError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> NotifyResult<Self> {
        Self::new(MailerConfig::from_env())
    }

    /// Send one templated email.
    pub async fn send(
        &self,
        to: &str,
        template: EmailTemplate,
        variables: serde_json::Value,
    ) -> NotifyResult<()> {
        let url = format!("{}/api/send", self.config.base_url);
        let request = SendRequest {
            from: &self.config.from,
            to,
            template: template.as_str(),
            variables,
        };

        debug!("Sending {} email to {}", template.as_str(), to);

        let mut builder = self.http.post(&url).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::send_failed(format!(
                "mail provider returned {}: {}",
                status, body
            )));
        }

        Ok(())
    }

    /// Tell the user their subscription lapsed before the post ran.
    pub async fn subscription_expired(&self, to: &str) -> NotifyResult<()> {
        self.send(to, EmailTemplate::SubscriptionExpired, serde_json::json!({}))
            .await
    }

    /// Tell the user their monthly quota blocked the post.
    pub async fn limit_reached(&self, to: &str, summary: &str) -> NotifyResult<()> {
        self.send(
            to,
            EmailTemplate::LimitReached,
            serde_json::json!({ "summary": summary }),
        )
        .await
    }

    /// Tell the user a scheduled video started generating.
    pub async fn processing_started(&self, to: &str, topic: &str) -> NotifyResult<()> {
        self.send(
            to,
            EmailTemplate::ProcessingStarted,
            serde_json::json!({ "topic": topic }),
        )
        .await
    }

    /// Tell the user a video finished.
    pub async fn video_generated(&self, to: &str, topic: &str, video_id: &str) -> NotifyResult<()> {
        self.send(
            to,
            EmailTemplate::VideoGenerated,
            serde_json::json!({ "topic": topic, "video_id": video_id }),
        )
        .await
    }

    /// Tell the user every post of their schedule has resolved.
    pub async fn schedule_complete(&self, to: &str) -> NotifyResult<()> {
        self.send(to, EmailTemplate::ScheduleComplete, serde_json::json!({}))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mailer_for(server: &MockServer, api_key: Option<&str>) -> Mailer {
        Mailer::new(MailerConfig {
            base_url: server.uri(),
            api_key: api_key.map(str::to_string),
            from: "PropReel <no-reply@propreel.app>".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_template_ids() {
        assert_eq!(EmailTemplate::SubscriptionExpired.as_str(), "subscription_expired");
        assert_eq!(EmailTemplate::LimitReached.as_str(), "limit_reached");
        assert_eq!(EmailTemplate::ProcessingStarted.as_str(), "processing_started");
        assert_eq!(EmailTemplate::VideoGenerated.as_str(), "video_generated");
        assert_eq!(EmailTemplate::ScheduleComplete.as_str(), "schedule_complete");
    }

    #[tokio::test]
    async fn test_send_posts_template_and_variables() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/send"))
            .and(header("authorization", "Bearer key_1"))
            .and(body_partial_json(serde_json::json!({
                "to": "agent@example.com",
                "template": "limit_reached",
                "variables": { "summary": "Monthly video limit reached (3 of 3 used)" }
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        mailer_for(&server, Some("key_1"))
            .limit_reached("agent@example.com", "Monthly video limit reached (3 of 3 used)")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_surfaces_provider_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/send"))
            .respond_with(ResponseTemplate::new(422).set_body_string("unknown template"))
            .expect(1)
            .mount(&server)
            .await;

        let err = mailer_for(&server, None)
            .subscription_expired("agent@example.com")
            .await
            .unwrap_err();
        match err {
            NotifyError::SendFailed(message) => {
                assert!(message.contains("422"));
                assert!(message.contains("unknown template"));
            }
            other => panic!("expected SendFailed, got {}", other),
        }
    }
}
