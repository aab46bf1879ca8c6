//! Client for the video-generation service.

use reqwest::Client;

use crate::client::{self, ServiceConfig};
use crate::error::AiResult;
use crate::types::{CreateVideoRequest, GenerateVideoAck, GenerateVideoRequest, ScriptParts};

const SERVICE: &str = "video";
const ENV_PREFIX: &str = "VIDEO_SERVICE";
const DEFAULT_URL: &str = "http://localhost:8020";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Client for the remote video service.
pub struct VideoClient {
    http: Client,
    config: ServiceConfig,
}

impl VideoClient {
    /// Create a new video client.
    pub fn new(config: ServiceConfig) -> AiResult<Self> {
        let http = config.http_client()?;
        Ok(Self { http, config })
    }

    /// Create from `VIDEO_SERVICE_*` environment variables.
    pub fn from_env() -> AiResult<Self> {
        Self::new(ServiceConfig::from_env(
            ENV_PREFIX,
            DEFAULT_URL,
            DEFAULT_TIMEOUT_SECS,
        ))
    }

    /// Run the script-enhancement step.
    ///
    /// Returns the enhanced hook/body/conclusion with percent-escapes
    /// decoded and line endings normalized.
    pub async fn create_video(&self, request: &CreateVideoRequest) -> AiResult<ScriptParts> {
        let raw: ScriptParts =
            client::post_json(&self.http, &self.config, SERVICE, "/api/videos/create", request)
                .await?;

        Ok(ScriptParts {
            hook: normalize_script(&raw.hook),
            body: normalize_script(&raw.body),
            conclusion: normalize_script(&raw.conclusion),
        })
    }

    /// Submit the final generation job.
    ///
    /// The service renders asynchronously; the ack only confirms the
    /// submission was accepted.
    pub async fn generate_video(
        &self,
        request: &GenerateVideoRequest,
    ) -> AiResult<GenerateVideoAck> {
        client::post_json(
            &self.http,
            &self.config,
            SERVICE,
            "/api/videos/generate",
            request,
        )
        .await
    }

    /// Check if the video service is reachable.
    pub async fn health_check(&self) -> bool {
        client::health_check(&self.http, &self.config, SERVICE).await
    }
}

/// Decode percent-escapes and normalize CRLF line breaks in a script part.
///
/// Text that fails to decode as UTF-8 is kept as-is.
pub fn normalize_script(raw: &str) -> String {
    let decoded = match urlencoding::decode(raw) {
        Ok(text) => text.into_owned(),
        Err(_) => raw.to_string(),
    };
    decoded.replace("\r\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use preel_models::CaptionSet;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> VideoClient {
        VideoClient::new(ServiceConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
            max_retries: 0,
        })
        .unwrap()
    }

    fn create_request() -> CreateVideoRequest {
        CreateVideoRequest {
            user_id: "u1".to_string(),
            topic: "Why staged homes sell faster".to_string(),
            keypoints: "psychology; photos".to_string(),
            context: Default::default(),
            language: "english".to_string(),
        }
    }

    #[test]
    fn test_normalize_script_decodes_percent_escapes() {
        assert_eq!(normalize_script("Buy%20now%21"), "Buy now!");
        assert_eq!(normalize_script("plain text"), "plain text");
    }

    #[test]
    fn test_normalize_script_normalizes_crlf() {
        assert_eq!(normalize_script("line one\r\nline two"), "line one\nline two");
        assert_eq!(
            normalize_script("a%0D%0Ab"),
            "a\nb",
            "encoded CRLF normalizes too"
        );
    }

    #[test]
    fn test_normalize_script_keeps_undecodable_input() {
        assert_eq!(normalize_script("broken %FF escape"), "broken %FF escape");
    }

    #[tokio::test]
    async fn test_create_video_normalizes_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/videos/create"))
            .and(body_partial_json(serde_json::json!({"user_id": "u1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "hook": "Stop%20scrolling%21",
                "body": "First point.\r\nSecond point.",
                "conclusion": "Call%20me%20today"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let script = client_for(&server)
            .await
            .create_video(&create_request())
            .await
            .unwrap();
        assert_eq!(script.hook, "Stop scrolling!");
        assert_eq!(script.body, "First point.\nSecond point.");
        assert_eq!(script.conclusion, "Call me today");
    }

    #[tokio::test]
    async fn test_generate_video_ack() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/videos/generate"))
            .and(body_partial_json(serde_json::json!({
                "schedule_id": "s1",
                "post_index": 0,
                "audio_ready": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"status": "queued", "video_id": "vid_42"}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let request = GenerateVideoRequest {
            user_id: "u1".to_string(),
            schedule_id: "s1".to_string(),
            post_index: 0,
            avatar: None,
            voice_id: None,
            hook: "hook text".to_string(),
            body: "body text".to_string(),
            conclusion: "conclusion text".to_string(),
            audio_ready: false,
            music_url: Some("https://r2/music.mp3?sig=x".to_string()),
            captions: CaptionSet::placeholder("t", "k"),
            language: "english".to_string(),
        };
        let ack = client_for(&server)
            .await
            .generate_video(&request)
            .await
            .unwrap();
        assert_eq!(ack.status, "queued");
        assert_eq!(ack.video_id.as_deref(), Some("vid_42"));
    }
}
