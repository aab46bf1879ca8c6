//! HTTP clients for the generation services behind the scheduling engine.
//!
//! Three upstream services are consumed: the content service (topic
//! trends, keypoints, per-platform captions), the video service (script
//! enhancement and final generation) and the speech service (script-part
//! synthesis). All three share the JSON-POST dialect in [`client`].

pub mod client;
pub mod content;
pub mod error;
pub mod speech;
pub mod types;
pub mod video;

pub use client::ServiceConfig;
pub use content::ContentClient;
pub use error::{AiError, AiResult};
pub use speech::{SpeechClient, DEFAULT_OUTPUT_FORMAT};
pub use types::{
    CaptionRequest, CreateVideoRequest, GenerateVideoAck, GenerateVideoRequest, ScriptParts,
    SpeechRequest, SpeechUrls, TrendBatchRequest, TrendBatchResponse,
};
pub use video::{normalize_script, VideoClient};
