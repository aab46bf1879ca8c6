//! Repositories for user-owned documents: subscription state, video
//! generation settings and previously used topic titles.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tracing::info;

use preel_models::{
    normalize_title, AvatarRef, SocialHandles, Subscription, UserContext, UserVideoSettings,
    VideoQuota,
};

use crate::client::FirestoreClient;
use crate::error::FirestoreResult;
use crate::retry::with_retry;
use crate::types::{Document, Filter, FromFirestoreValue, StructuredQuery, Value};

/// Top-level collection of user documents.
const USERS_COLLECTION: &str = "users";

/// Legacy top-level collection of generated videos, keyed by email.
const LEGACY_VIDEOS_COLLECTION: &str = "videos";

/// Page size when walking a user's video subcollection.
const VIDEO_PAGE_SIZE: u32 = 300;

// =============================================================================
// Subscriptions
// =============================================================================

/// Read-only access to a user's subscription and quota.
pub struct SubscriptionRepository {
    client: FirestoreClient,
}

impl SubscriptionRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// The user's subscription, if the user document carries one.
    pub async fn get(&self, user_id: &str) -> FirestoreResult<Option<Subscription>> {
        let doc = self.client.get_document(USERS_COLLECTION, user_id).await?;
        Ok(doc.as_ref().and_then(parse_subscription))
    }

    /// Current video quota derived from the subscription.
    ///
    /// Users without a subscription get a zero quota.
    pub async fn video_quota(&self, user_id: &str) -> FirestoreResult<VideoQuota> {
        let quota = match self.get(user_id).await? {
            Some(sub) => {
                let remaining = sub.video_limit.saturating_sub(sub.videos_used);
                VideoQuota {
                    can_create: sub.is_active(Utc::now()) && remaining > 0,
                    limit: sub.video_limit,
                    remaining,
                }
            }
            None => VideoQuota {
                can_create: false,
                limit: 0,
                remaining: 0,
            },
        };
        Ok(quota)
    }
}

fn parse_subscription(doc: &Document) -> Option<Subscription> {
    let sub = doc.field("subscription")?.map_fields()?;

    let get_string = |key: &str| -> String {
        sub.get(key)
            .and_then(String::from_firestore_value)
            .unwrap_or_default()
    };

    Some(Subscription {
        plan: get_string("plan"),
        status: get_string("status"),
        current_period_end: sub
            .get("current_period_end")
            .and_then(chrono::DateTime::from_firestore_value),
        video_limit: sub
            .get("video_limit")
            .and_then(u32::from_firestore_value)
            .unwrap_or(0),
        videos_used: sub
            .get("videos_used")
            .and_then(u32::from_firestore_value)
            .unwrap_or(0),
    })
}

// =============================================================================
// Video Settings
// =============================================================================

/// Access to `users/{uid}/settings/video`.
pub struct UserSettingsRepository {
    client: FirestoreClient,
}

impl UserSettingsRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Video generation settings for a user.
    ///
    /// Missing documents yield defaults; generation then falls back to
    /// service-level avatar and voice choices.
    pub async fn get(&self, user_id: &str) -> FirestoreResult<UserVideoSettings> {
        let collection = format!("{}/{}/settings", USERS_COLLECTION, user_id);
        let doc = self.client.get_document(&collection, "video").await?;
        Ok(doc
            .as_ref()
            .map(document_to_settings)
            .unwrap_or_default())
    }
}

fn document_to_settings(doc: &Document) -> UserVideoSettings {
    let Some(fields) = doc.fields.as_ref() else {
        return UserVideoSettings::default();
    };

    let opt_string = |key: &str| -> Option<String> {
        fields
            .get(key)
            .and_then(String::from_firestore_value)
            .filter(|s| !s.trim().is_empty())
    };

    UserVideoSettings {
        avatar: fields.get("avatar").and_then(parse_avatar),
        voice_id: opt_string("voice_id"),
        voice_type: opt_string("voice_type"),
        music_track: opt_string("music_track"),
        context: fields
            .get("context")
            .and_then(Value::map_fields)
            .map(parse_context)
            .unwrap_or_default(),
    }
}

/// Avatar settings come in two stored shapes: a bare id string from
/// older documents, or a map with `avatar_id` and `avatar_type`.
fn parse_avatar(value: &Value) -> Option<AvatarRef> {
    match value {
        Value::StringValue(id) if !id.trim().is_empty() => Some(AvatarRef::Id(id.clone())),
        Value::MapValue(map) => {
            let fields = map.fields.as_ref()?;
            let avatar_id = fields
                .get("avatar_id")
                .and_then(String::from_firestore_value)
                .filter(|s| !s.trim().is_empty())?;
            Some(AvatarRef::Detailed {
                avatar_id,
                avatar_type: fields
                    .get("avatar_type")
                    .and_then(String::from_firestore_value),
            })
        }
        _ => None,
    }
}

fn parse_context(map: &HashMap<String, Value>) -> UserContext {
    let opt_string = |key: &str| -> Option<String> {
        map.get(key)
            .and_then(String::from_firestore_value)
            .filter(|s| !s.trim().is_empty())
    };

    let handles = map
        .get("handles")
        .and_then(Value::map_fields)
        .map(|h| {
            let handle = |key: &str| -> Option<String> {
                h.get(key)
                    .and_then(String::from_firestore_value)
                    .filter(|s| !s.trim().is_empty())
            };
            SocialHandles {
                instagram: handle("instagram"),
                facebook: handle("facebook"),
                tiktok: handle("tiktok"),
                linkedin: handle("linkedin"),
                twitter: handle("twitter"),
                youtube: handle("youtube"),
            }
        })
        .unwrap_or_default();

    UserContext {
        name: opt_string("name"),
        position: opt_string("position"),
        company: opt_string("company"),
        city: opt_string("city"),
        handles,
        language: opt_string("language").unwrap_or_else(|| "english".to_string()),
    }
}

// =============================================================================
// Topic History
// =============================================================================

/// Titles of videos the user already has, for topic deduplication.
pub struct TopicHistoryRepository {
    client: FirestoreClient,
}

impl TopicHistoryRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// All prior video titles for a user, normalized for comparison.
    ///
    /// Unions the user's video subcollection with legacy top-level
    /// video records that are only linked by email.
    pub async fn existing_titles(
        &self,
        user_id: &str,
        email: &str,
    ) -> FirestoreResult<HashSet<String>> {
        let mut titles = HashSet::new();

        let collection = format!("{}/{}/videos", USERS_COLLECTION, user_id);
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .client
                .list_documents(&collection, Some(VIDEO_PAGE_SIZE), page_token.as_deref())
                .await?;

            collect_titles(&page.documents, &mut titles);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        let query = StructuredQuery::collection(LEGACY_VIDEOS_COLLECTION).with_filter(
            Filter::field_equals("email", Value::StringValue(email.to_string())),
        );
        let legacy = with_retry(self.client.retry_config(), "legacy_video_titles", || {
            self.client.run_query(None, query.clone())
        })
        .await?;
        collect_titles(&legacy, &mut titles);

        info!(
            user_id = %user_id,
            count = titles.len(),
            "Loaded prior video titles for deduplication"
        );
        Ok(titles)
    }
}

fn collect_titles(docs: &[Document], titles: &mut HashSet<String>) {
    for doc in docs {
        if let Some(title) = doc.field("title").and_then(Value::as_str) {
            if !title.trim().is_empty() {
                titles.insert(normalize_title(title));
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
