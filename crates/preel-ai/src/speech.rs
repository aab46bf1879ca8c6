//! Client for the speech synthesis service.

use preel_models::VoiceSettings;
use reqwest::Client;

use crate::client::{self, ServiceConfig};
use crate::error::AiResult;
use crate::types::{ScriptParts, SpeechRequest, SpeechUrls};

const SERVICE: &str = "speech";
const ENV_PREFIX: &str = "SPEECH_SERVICE";
const DEFAULT_URL: &str = "http://localhost:8030";
const DEFAULT_TIMEOUT_SECS: u64 = 180;

/// Audio format requested for synthesized script parts.
pub const DEFAULT_OUTPUT_FORMAT: &str = "mp3_44100_128";

/// Client for the text-to-speech service.
pub struct SpeechClient {
    http: Client,
    config: ServiceConfig,
}

impl SpeechClient {
    /// Create a new speech client.
    pub fn new(config: ServiceConfig) -> AiResult<Self> {
        let http = config.http_client()?;
        Ok(Self { http, config })
    }

    /// Create from `SPEECH_SERVICE_*` environment variables.
    pub fn from_env() -> AiResult<Self> {
        Self::new(ServiceConfig::from_env(
            ENV_PREFIX,
            DEFAULT_URL,
            DEFAULT_TIMEOUT_SECS,
        ))
    }

    /// Synthesize the three script parts to hosted audio.
    pub async fn synthesize(&self, request: &SpeechRequest) -> AiResult<SpeechUrls> {
        client::post_json(&self.http, &self.config, SERVICE, "/api/tts", request).await
    }

    /// Check if the speech service is reachable.
    pub async fn health_check(&self) -> bool {
        client::health_check(&self.http, &self.config, SERVICE).await
    }
}

impl SpeechRequest {
    /// Build a request for a script with the default output format.
    pub fn for_script(
        voice_id: impl Into<String>,
        script: &ScriptParts,
        voice_settings: Option<VoiceSettings>,
    ) -> Self {
        Self {
            voice_id: voice_id.into(),
            hook: script.hook.clone(),
            body: script.body.clone(),
            conclusion: script.conclusion.clone(),
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
            voice_settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn script() -> ScriptParts {
        ScriptParts {
            hook: "Stop scrolling".to_string(),
            body: "Three things to know".to_string(),
            conclusion: "Call me today".to_string(),
        }
    }

    #[test]
    fn test_for_script_uses_default_format() {
        let request = SpeechRequest::for_script("v1", &script(), None);
        assert_eq!(request.output_format, DEFAULT_OUTPUT_FORMAT);
        assert_eq!(request.hook, "Stop scrolling");
        assert!(request.voice_settings.is_none());
    }

    #[tokio::test]
    async fn test_synthesize_with_cloned_preset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/tts"))
            .and(body_partial_json(serde_json::json!({
                "voice_id": "clone_7",
                "output_format": "mp3_44100_128",
                "voice_settings": {
                    "stability": 0.5,
                    "similarity_boost": 0.75,
                    "style": 0.0,
                    "use_speaker_boost": true
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "hook_url": "https://cdn/hook.mp3",
                "body_url": "https://cdn/body.mp3",
                "conclusion_url": "https://cdn/end.mp3"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = SpeechClient::new(ServiceConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
            max_retries: 0,
        })
        .unwrap();

        let request =
            SpeechRequest::for_script("clone_7", &script(), Some(VoiceSettings::cloned_preset()));
        let urls = client.synthesize(&request).await.unwrap();
        assert_eq!(urls.hook_url, "https://cdn/hook.mp3");
        assert_eq!(urls.conclusion_url, "https://cdn/end.mp3");
    }
}
