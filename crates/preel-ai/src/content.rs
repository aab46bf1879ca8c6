//! Client for the content service (trends, keypoints, captions).

use preel_models::{CaptionSet, Trend};
use reqwest::Client;

use crate::client::{self, ServiceConfig};
use crate::error::AiResult;
use crate::types::{CaptionRequest, KeypointsRequest, KeypointsResponse, TrendBatchRequest, TrendBatchResponse};

const SERVICE: &str = "content";
const ENV_PREFIX: &str = "CONTENT_SERVICE";
const DEFAULT_URL: &str = "http://localhost:8010";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Client for the topic and caption generator.
pub struct ContentClient {
    http: Client,
    config: ServiceConfig,
}

impl ContentClient {
    /// Create a new content client.
    pub fn new(config: ServiceConfig) -> AiResult<Self> {
        let http = config.http_client()?;
        Ok(Self { http, config })
    }

    /// Create from `CONTENT_SERVICE_*` environment variables.
    pub fn from_env() -> AiResult<Self> {
        Self::new(ServiceConfig::from_env(
            ENV_PREFIX,
            DEFAULT_URL,
            DEFAULT_TIMEOUT_SECS,
        ))
    }

    /// Generate a batch of topic trends.
    ///
    /// Every trend carries a description, keypoints and six drafted
    /// captions. The service may return fewer than `count`.
    pub async fn generate_trends(&self, count: u32, seed: Option<&str>) -> AiResult<Vec<Trend>> {
        let request = TrendBatchRequest {
            count,
            seed: seed.map(str::to_string),
        };
        let response: TrendBatchResponse =
            client::post_json(&self.http, &self.config, SERVICE, "/api/trends", &request).await?;
        Ok(response.trends)
    }

    /// Generate fresh keypoints for an edited topic.
    pub async fn keypoints(&self, topic: &str) -> AiResult<String> {
        let request = KeypointsRequest {
            topic: topic.to_string(),
        };
        let response: KeypointsResponse =
            client::post_json(&self.http, &self.config, SERVICE, "/api/keypoints", &request)
                .await?;
        Ok(response.keypoints)
    }

    /// Generate platform captions for one post.
    pub async fn generate_captions(&self, request: &CaptionRequest) -> AiResult<CaptionSet> {
        client::post_json(&self.http, &self.config, SERVICE, "/api/captions", request).await
    }

    /// Check if the content service is reachable.
    pub async fn health_check(&self) -> bool {
        client::health_check(&self.http, &self.config, SERVICE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> ContentClient {
        ContentClient::new(ServiceConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
            max_retries: 0,
        })
        .unwrap()
    }

    fn trend_json(title: &str) -> serde_json::Value {
        serde_json::json!({
            "description": title,
            "keypoints": "k1; k2",
            "instagram_caption": "ig",
            "facebook_caption": "fb",
            "tiktok_caption": "tt",
            "linkedin_caption": "li",
            "twitter_caption": "tw",
            "youtube_caption": "yt"
        })
    }

    #[tokio::test]
    async fn test_generate_trends() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/trends"))
            .and(body_partial_json(serde_json::json!({"count": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "trends": [trend_json("First topic"), trend_json("Second topic")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let trends = client_for(&server)
            .await
            .generate_trends(2, None)
            .await
            .unwrap();
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].description, "First topic");
        assert!(trends[1].validate().is_ok());
    }

    #[tokio::test]
    async fn test_generate_trends_sends_seed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/trends"))
            .and(body_partial_json(
                serde_json::json!({"count": 1, "seed": "austin"}),
            ))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"trends": []})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let trends = client_for(&server)
            .await
            .generate_trends(1, Some("austin"))
            .await
            .unwrap();
        assert!(trends.is_empty());
    }

    #[tokio::test]
    async fn test_keypoints() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/keypoints"))
            .and(body_partial_json(
                serde_json::json!({"topic": "Curb appeal on a budget"}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"keypoints": "paint; lighting; planters"}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let keypoints = client_for(&server)
            .await
            .keypoints("Curb appeal on a budget")
            .await
            .unwrap();
        assert_eq!(keypoints, "paint; lighting; planters");
    }

    #[tokio::test]
    async fn test_generate_captions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/captions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "instagram_caption": "ig text",
                "facebook_caption": "fb text",
                "tiktok_caption": "tt text",
                "linkedin_caption": "li text",
                "twitter_caption": "tw text",
                "youtube_caption": "yt text"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = CaptionRequest {
            topic: "Staging small condos".to_string(),
            keypoints: "declutter".to_string(),
            context: Default::default(),
            language: "english".to_string(),
        };
        let captions = client_for(&server)
            .await
            .generate_captions(&request)
            .await
            .unwrap();
        assert!(captions.is_complete());
        assert_eq!(captions.twitter_caption, "tw text");
    }
}
