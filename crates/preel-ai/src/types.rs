//! Request and response types for the upstream services.

use preel_models::{Avatar, CaptionSet, Trend, UserContext, VoiceSettings};
use serde::{Deserialize, Serialize};

/// Request for a batch of topic trends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendBatchRequest {
    /// Number of trends wanted
    pub count: u32,
    /// Optional topic seed, e.g. the user's market
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<String>,
}

/// Response carrying generated trends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendBatchResponse {
    #[serde(default)]
    pub trends: Vec<Trend>,
}

/// Request for fresh keypoints on one topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeypointsRequest {
    pub topic: String,
}

/// Keypoints for one topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeypointsResponse {
    pub keypoints: String,
}

/// Request for per-platform captions of one post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionRequest {
    pub topic: String,
    pub keypoints: String,
    /// Who the captions speak as
    #[serde(default)]
    pub context: UserContext,
    pub language: String,
}

/// Request for the script-enhancement step of video creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVideoRequest {
    pub user_id: String,
    pub topic: String,
    pub keypoints: String,
    #[serde(default)]
    pub context: UserContext,
    pub language: String,
}

/// Enhanced script returned by the create endpoint.
///
/// Parts arrive URL-encoded with CRLF line breaks; the client decodes
/// and normalizes them before handing them out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptParts {
    pub hook: String,
    pub body: String,
    pub conclusion: String,
}

/// Submission to the video-generation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateVideoRequest {
    pub user_id: String,
    /// Schedule and post the completion callback should resolve to
    pub schedule_id: String,
    pub post_index: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<Avatar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,

    /// Script parts, as audio URLs when synthesis succeeded, else text
    pub hook: String,
    pub body: String,
    pub conclusion: String,
    /// True when hook/body/conclusion are audio URLs
    pub audio_ready: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub music_url: Option<String>,

    #[serde(flatten)]
    pub captions: CaptionSet,

    pub language: String,
}

/// Acknowledgement from the generate endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateVideoAck {
    /// Queue state reported by the service
    #[serde(default)]
    pub status: String,
    /// Remote video id, when assigned synchronously
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
}

/// Speech synthesis request for the three script parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub voice_id: String,
    pub hook: String,
    pub body: String,
    pub conclusion: String,
    pub output_format: String,
    /// Synthesis parameters, sent for cloned voices
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_settings: Option<VoiceSettings>,
}

/// Audio URLs for the three synthesized parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechUrls {
    pub hook_url: String,
    pub body_url: String,
    pub conclusion_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use preel_models::AvatarKind;

    #[test]
    fn test_trend_batch_request_omits_missing_seed() {
        let request = TrendBatchRequest {
            count: 10,
            seed: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"count": 10}));
    }

    #[test]
    fn test_trend_batch_response_parses_flattened_captions() {
        let body = serde_json::json!({
            "trends": [{
                "description": "Pricing in a cooling market",
                "keypoints": "comps; days on market",
                "instagram_caption": "ig",
                "facebook_caption": "fb",
                "tiktok_caption": "tt",
                "linkedin_caption": "li",
                "twitter_caption": "tw",
                "youtube_caption": "yt"
            }]
        });

        let response: TrendBatchResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.trends.len(), 1);
        assert!(response.trends[0].validate().is_ok());
    }

    #[test]
    fn test_generate_request_flattens_captions() {
        let request = GenerateVideoRequest {
            user_id: "u1".to_string(),
            schedule_id: "s1".to_string(),
            post_index: 2,
            avatar: Some(Avatar {
                id: "av_9".to_string(),
                kind: AvatarKind::TalkingPhoto,
            }),
            voice_id: Some("v1".to_string()),
            hook: "https://cdn/hook.mp3".to_string(),
            body: "https://cdn/body.mp3".to_string(),
            conclusion: "https://cdn/end.mp3".to_string(),
            audio_ready: true,
            music_url: None,
            captions: CaptionSet::placeholder("topic", "points"),
            language: "english".to_string(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["instagram_caption"], "topic - points");
        assert_eq!(json["avatar"]["kind"], "talking_photo");
        assert!(json.get("music_url").is_none());
    }

    #[test]
    fn test_speech_request_omits_settings_for_library_voices() {
        let request = SpeechRequest {
            voice_id: "lib_1".to_string(),
            hook: "h".to_string(),
            body: "b".to_string(),
            conclusion: "c".to_string(),
            output_format: "mp3_44100_128".to_string(),
            voice_settings: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("voice_settings").is_none());
    }
}
