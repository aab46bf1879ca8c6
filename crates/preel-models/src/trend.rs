//! Trend topics returned by the content generator.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CaptionSet, Platform};

/// A generated topic candidate for one post.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Trend {
    /// Topic line, also used as the post title
    pub description: String,

    /// Supporting keypoints for the video script
    pub keypoints: String,

    /// Captions the generator drafted per platform
    #[serde(flatten)]
    pub captions: CaptionSet,
}

/// A trend payload missing required content.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("trend is missing {field}: {title:?}")]
pub struct IncompleteTrend {
    /// Which field was empty
    pub field: &'static str,
    /// The trend's title, for log context
    pub title: String,
}

impl Trend {
    /// Reject trends the generator returned half-filled.
    ///
    /// Description, keypoints and all six captions must be non-empty.
    pub fn validate(&self) -> Result<(), IncompleteTrend> {
        if self.description.trim().is_empty() {
            return Err(self.incomplete("description"));
        }
        if self.keypoints.trim().is_empty() {
            return Err(self.incomplete("keypoints"));
        }
        for platform in Platform::ALL {
            if self.captions.get(platform).trim().is_empty() {
                return Err(self.incomplete(platform.caption_field()));
            }
        }
        Ok(())
    }

    /// Title in the form used for duplicate detection.
    pub fn normalized_title(&self) -> String {
        normalize_title(&self.description)
    }

    fn incomplete(&self, field: &'static str) -> IncompleteTrend {
        IncompleteTrend {
            field,
            title: self.description.clone(),
        }
    }
}

/// Normalize a topic title for comparison: lower-case, trimmed,
/// inner whitespace collapsed to single spaces.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_trend() -> Trend {
        Trend {
            description: "Why staged homes sell faster".to_string(),
            keypoints: "buyer psychology; listing photos".to_string(),
            captions: CaptionSet::placeholder("Why staged homes sell faster", "buyer psychology"),
        }
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Why Staged  Homes\tSell Faster "), "why staged homes sell faster");
        assert_eq!(normalize_title("ALL CAPS"), "all caps");
        assert_eq!(normalize_title(""), "");
    }

    #[test]
    fn test_validate_complete() {
        assert!(complete_trend().validate().is_ok());
    }

    #[test]
    fn test_validate_missing_keypoints() {
        let mut trend = complete_trend();
        trend.keypoints = "   ".to_string();

        let err = trend.validate().unwrap_err();
        assert_eq!(err.field, "keypoints");
    }

    #[test]
    fn test_validate_missing_caption() {
        let mut trend = complete_trend();
        trend.captions.twitter_caption = String::new();

        let err = trend.validate().unwrap_err();
        assert_eq!(err.field, "twitter_caption");
    }
}
