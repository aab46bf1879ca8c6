//! Background music track resolution.
//!
//! Tracks live in the media bucket under a shared prefix. User settings
//! store a track name; the video service receives a presigned URL.

use std::time::Duration;

use tracing::{debug, warn};

use crate::client::R2Client;
use crate::error::StorageResult;

/// Bucket prefix holding the shared music library.
const MUSIC_PREFIX: &str = "music/";

/// Lifetime of presigned track URLs handed to the video service.
const TRACK_URL_TTL: Duration = Duration::from_secs(60 * 60);

/// Resolves configured music tracks to presigned URLs.
#[derive(Clone)]
pub struct MusicLibrary {
    storage: R2Client,
}

impl MusicLibrary {
    pub fn new(storage: R2Client) -> Self {
        Self { storage }
    }

    /// Resolve a configured track to a presigned URL.
    ///
    /// Track values may be bare names ("calm-keys") or full keys under
    /// the music prefix. Missing or empty tracks resolve to `None` so
    /// video generation proceeds without background music.
    pub async fn resolve_track(&self, track: &str) -> StorageResult<Option<String>> {
        let track = track.trim();
        if track.is_empty() {
            return Ok(None);
        }

        let key = track_key(track);
        if !self.storage.exists(&key).await? {
            warn!("Music track {} not found, continuing without music", key);
            return Ok(None);
        }

        let url = self.storage.presign_get(&key, TRACK_URL_TTL).await?;
        debug!("Resolved music track {}", key);
        Ok(Some(url))
    }
}

/// Full object key for a track value.
///
/// Bare names get the prefix and a default extension; values that
/// already look like keys pass through.
fn track_key(track: &str) -> String {
    let mut key = if track.starts_with(MUSIC_PREFIX) {
        track.to_string()
    } else {
        format!("{}{}", MUSIC_PREFIX, track)
    };
    if !key.contains('.') {
        key.push_str(".mp3");
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_key_from_bare_name() {
        assert_eq!(track_key("calm-keys"), "music/calm-keys.mp3");
    }

    #[test]
    fn test_track_key_passes_full_key_through() {
        assert_eq!(track_key("music/upbeat.mp3"), "music/upbeat.mp3");
    }

    #[test]
    fn test_track_key_keeps_existing_extension() {
        assert_eq!(track_key("ambient.wav"), "music/ambient.wav");
    }
}
