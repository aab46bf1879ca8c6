//! Per-user video generation settings.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Kind of avatar the remote video service renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum AvatarKind {
    /// Full studio avatar
    #[default]
    Avatar,
    /// Animated photo avatar
    TalkingPhoto,
}

impl AvatarKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AvatarKind::Avatar => "avatar",
            AvatarKind::TalkingPhoto => "talking_photo",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "avatar" => Some(AvatarKind::Avatar),
            "talking_photo" => Some(AvatarKind::TalkingPhoto),
            _ => None,
        }
    }
}

/// Avatar as stored in user settings.
///
/// Legacy documents hold a bare id string; newer ones a detailed object.
/// Both normalize to [`Avatar`] at the settings boundary so the rest of
/// the pipeline sees one shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum AvatarRef {
    Id(String),
    Detailed {
        avatar_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        avatar_type: Option<String>,
    },
}

impl AvatarRef {
    /// Normalize to the canonical `{id, kind}` pair.
    ///
    /// Unknown or missing kinds default to a studio avatar.
    pub fn normalize(&self) -> Avatar {
        match self {
            AvatarRef::Id(id) => Avatar {
                id: id.clone(),
                kind: AvatarKind::Avatar,
            },
            AvatarRef::Detailed {
                avatar_id,
                avatar_type,
            } => Avatar {
                id: avatar_id.clone(),
                kind: avatar_type
                    .as_deref()
                    .and_then(AvatarKind::parse)
                    .unwrap_or_default(),
            },
        }
    }
}

/// Normalized avatar passed to the video service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Avatar {
    pub id: String,
    pub kind: AvatarKind,
}

/// ElevenLabs-style synthesis parameters sent for cloned voices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
}

impl VoiceSettings {
    /// Preset applied to cloned voices.
    pub fn cloned_preset() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.0,
            use_speaker_boost: true,
        }
    }
}

/// Social profile handles folded into caption prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct SocialHandles {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiktok: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube: Option<String>,
}

/// Who the captions speak as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UserContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default)]
    pub handles: SocialHandles,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "english".to_string()
}

impl Default for UserContext {
    fn default() -> Self {
        Self {
            name: None,
            position: None,
            company: None,
            city: None,
            handles: SocialHandles::default(),
            language: default_language(),
        }
    }
}

/// Video-generation settings stored per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct UserVideoSettings {
    /// Avatar selection, either legacy id or detailed form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<AvatarRef>,

    /// Voice id at the speech service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,

    /// "cloned" or "library"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_type: Option<String>,

    /// Music track key in the media bucket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_track: Option<String>,

    /// Caption personalization context
    #[serde(default)]
    pub context: UserContext,
}

impl UserVideoSettings {
    /// Normalized avatar, if one is configured.
    pub fn avatar(&self) -> Option<Avatar> {
        self.avatar.as_ref().map(AvatarRef::normalize)
    }

    /// Whether the configured voice is a user clone.
    pub fn is_cloned_voice(&self) -> bool {
        self.voice_type.as_deref() == Some("cloned")
    }

    /// Synthesis parameters to send, if the voice needs them.
    pub fn voice_settings(&self) -> Option<VoiceSettings> {
        if self.is_cloned_voice() {
            Some(VoiceSettings::cloned_preset())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avatar_ref_normalization() {
        let legacy = AvatarRef::Id("av_123".to_string());
        assert_eq!(
            legacy.normalize(),
            Avatar {
                id: "av_123".to_string(),
                kind: AvatarKind::Avatar
            }
        );

        let detailed = AvatarRef::Detailed {
            avatar_id: "tp_9".to_string(),
            avatar_type: Some("talking_photo".to_string()),
        };
        assert_eq!(detailed.normalize().kind, AvatarKind::TalkingPhoto);

        let unknown = AvatarRef::Detailed {
            avatar_id: "x".to_string(),
            avatar_type: Some("hologram".to_string()),
        };
        assert_eq!(unknown.normalize().kind, AvatarKind::Avatar);
    }

    #[test]
    fn test_avatar_ref_serde_shapes() {
        let legacy: AvatarRef = serde_json::from_str("\"av_123\"").unwrap();
        assert!(matches!(legacy, AvatarRef::Id(_)));

        let detailed: AvatarRef =
            serde_json::from_str(r#"{"avatar_id":"tp_9","avatar_type":"talking_photo"}"#).unwrap();
        assert!(matches!(detailed, AvatarRef::Detailed { .. }));
    }

    #[test]
    fn test_voice_settings_only_for_clones() {
        let mut settings = UserVideoSettings {
            voice_id: Some("v1".to_string()),
            voice_type: Some("library".to_string()),
            ..Default::default()
        };
        assert!(settings.voice_settings().is_none());

        settings.voice_type = Some("cloned".to_string());
        let preset = settings.voice_settings().unwrap();
        assert!(preset.use_speaker_boost);
    }

    #[test]
    fn test_default_language() {
        let ctx = UserContext::default();
        assert_eq!(ctx.language, "english");
    }
}
