//! Typed repository for schedule documents.
//!
//! Posts are stored as an index-keyed map (`posts.p0`, `posts.p1`, ...)
//! rather than an array, because Firestore update masks cannot address
//! array elements. The map keys encode slot order; reads rebuild the
//! ordered vector.

use std::collections::HashMap;

use chrono::Utc;
use tracing::info;

use preel_models::{
    CaptionSet, CaptionStatus, Frequency, Platform, Post, PostStatus, Recurrence, Schedule,
    ScheduleId, ScheduleStatus,
};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::retry::with_retry;
use crate::types::{Document, Filter, FromFirestoreValue, StructuredQuery, ToFirestoreValue, Value};

/// Top-level collection holding schedule documents.
const SCHEDULES_COLLECTION: &str = "schedules";

/// A schedule together with the document's Firestore update time.
///
/// The update time is the precondition token for guarded writes: a
/// write guarded by it only lands if nobody else wrote in between.
#[derive(Debug, Clone)]
pub struct VersionedSchedule {
    pub schedule: Schedule,
    pub update_time: String,
}

/// Repository for schedule documents.
pub struct ScheduleRepository {
    client: FirestoreClient,
}

impl ScheduleRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Persist a freshly planned schedule.
    pub async fn create(&self, schedule: &Schedule) -> FirestoreResult<()> {
        let fields = schedule_to_fields(schedule);
        self.client
            .create_document(SCHEDULES_COLLECTION, schedule.schedule_id.as_str(), fields)
            .await?;
        info!(
            "Created schedule {} with {} posts",
            schedule.schedule_id,
            schedule.posts.len()
        );
        Ok(())
    }

    /// Get a schedule by id.
    pub async fn get(&self, id: &ScheduleId) -> FirestoreResult<Option<Schedule>> {
        let doc = self
            .client
            .get_document(SCHEDULES_COLLECTION, id.as_str())
            .await?;
        doc.as_ref().map(document_to_schedule).transpose()
    }

    /// Get a schedule together with its update time for guarded writes.
    pub async fn get_versioned(&self, id: &ScheduleId) -> FirestoreResult<Option<VersionedSchedule>> {
        let doc = self
            .client
            .get_document(SCHEDULES_COLLECTION, id.as_str())
            .await?;

        match doc {
            Some(d) => {
                let update_time = d.update_time.clone().ok_or_else(|| {
                    FirestoreError::invalid_response("schedule document missing updateTime")
                })?;
                Ok(Some(VersionedSchedule {
                    schedule: document_to_schedule(&d)?,
                    update_time,
                }))
            }
            None => Ok(None),
        }
    }

    /// The user's active schedule, if one exists.
    pub async fn find_active_for_user(&self, user_id: &str) -> FirestoreResult<Option<Schedule>> {
        let query = StructuredQuery::collection(SCHEDULES_COLLECTION)
            .with_filter(Filter::and(vec![
                Filter::field_equals("user_id", Value::StringValue(user_id.to_string())),
                Filter::field_equals("is_active", Value::BooleanValue(true)),
            ]))
            .with_limit(1);

        let docs = with_retry(self.client.retry_config(), "find_active_schedule", || {
            self.client.run_query(None, query.clone())
        })
        .await?;

        docs.first().map(document_to_schedule).transpose()
    }

    /// All active schedules, scanned for due posts.
    pub async fn list_active(&self) -> FirestoreResult<Vec<Schedule>> {
        let query = StructuredQuery::collection(SCHEDULES_COLLECTION)
            .with_filter(Filter::field_equals("is_active", Value::BooleanValue(true)));

        let docs = with_retry(self.client.retry_config(), "list_active_schedules", || {
            self.client.run_query(None, query.clone())
        })
        .await?;

        docs.iter().map(document_to_schedule).collect()
    }

    /// Set the schedule-level enrichment status.
    pub async fn set_status(&self, id: &ScheduleId, status: ScheduleStatus) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), status.as_str().to_firestore_value());
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

        self.client
            .update_document(
                SCHEDULES_COLLECTION,
                id.as_str(),
                fields,
                Some(vec!["status".to_string(), "updated_at".to_string()]),
            )
            .await?;
        Ok(())
    }

    /// Activate or deactivate a schedule.
    pub async fn set_active(&self, id: &ScheduleId, active: bool) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("is_active".to_string(), active.to_firestore_value());
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

        self.client
            .update_document(
                SCHEDULES_COLLECTION,
                id.as_str(),
                fields,
                Some(vec!["is_active".to_string(), "updated_at".to_string()]),
            )
            .await?;
        Ok(())
    }

    /// Delete a schedule document. Idempotent.
    pub async fn delete(&self, id: &ScheduleId) -> FirestoreResult<()> {
        self.client
            .delete_document(SCHEDULES_COLLECTION, id.as_str())
            .await
    }

    /// Update fields of a single post without touching its siblings.
    ///
    /// `updates` maps post-level field names ("status", "error",
    /// "instagram_caption", ...) to their new values.
    pub async fn update_post_fields(
        &self,
        id: &ScheduleId,
        index: usize,
        updates: HashMap<String, Value>,
    ) -> FirestoreResult<()> {
        self.write_post_fields(id, index, updates, None).await
    }

    /// Like [`Self::update_post_fields`], but only applies if the
    /// document still carries `update_time`.
    pub async fn update_post_fields_guarded(
        &self,
        id: &ScheduleId,
        index: usize,
        updates: HashMap<String, Value>,
        update_time: &str,
    ) -> FirestoreResult<()> {
        self.write_post_fields(id, index, updates, Some(update_time))
            .await
    }

    async fn write_post_fields(
        &self,
        id: &ScheduleId,
        index: usize,
        updates: HashMap<String, Value>,
        update_time: Option<&str>,
    ) -> FirestoreResult<()> {
        let mut mask: Vec<String> = updates
            .keys()
            .map(|field| post_field_path(index, field))
            .collect();
        mask.push("updated_at".to_string());

        let mut fields = nested_post_body(index, updates);
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

        self.client
            .update_document_with_precondition(
                SCHEDULES_COLLECTION,
                id.as_str(),
                fields,
                Some(mask),
                update_time,
            )
            .await?;
        Ok(())
    }

    /// Write enriched captions for one post and mark them ready.
    pub async fn set_post_captions(
        &self,
        id: &ScheduleId,
        index: usize,
        captions: &CaptionSet,
    ) -> FirestoreResult<()> {
        let mut updates = HashMap::new();
        for platform in Platform::ALL {
            updates.insert(
                platform.caption_field().to_string(),
                captions.get(platform).to_firestore_value(),
            );
        }
        updates.insert(
            "caption_status".to_string(),
            CaptionStatus::Ready.as_str().to_firestore_value(),
        );
        updates.insert("enhanced".to_string(), true.to_firestore_value());

        self.update_post_fields(id, index, updates).await
    }

    /// Mark one post's caption enrichment as failed, recording why.
    pub async fn set_post_captions_failed(
        &self,
        id: &ScheduleId,
        index: usize,
        error: &str,
    ) -> FirestoreResult<()> {
        let mut updates = HashMap::new();
        updates.insert(
            "caption_status".to_string(),
            CaptionStatus::Failed.as_str().to_firestore_value(),
        );
        updates.insert("error".to_string(), error.to_firestore_value());
        self.update_post_fields(id, index, updates).await
    }

    /// Replace the full posts map in one guarded write.
    ///
    /// Used when posts are re-timed, edited or deleted, which shifts
    /// indexes and must not interleave with concurrent writers.
    pub async fn replace_posts(
        &self,
        id: &ScheduleId,
        posts: &[Post],
        update_time: &str,
    ) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("posts".to_string(), posts_to_value(posts));
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

        self.client
            .update_document_with_precondition(
                SCHEDULES_COLLECTION,
                id.as_str(),
                fields,
                Some(vec!["posts".to_string(), "updated_at".to_string()]),
                Some(update_time),
            )
            .await?;
        Ok(())
    }

    /// Rewrite cadence fields and the re-timed posts in one guarded write.
    pub async fn update_cadence(
        &self,
        id: &ScheduleId,
        frequency: Frequency,
        recurrence: &Recurrence,
        timezone: &str,
        posts: &[Post],
        update_time: &str,
    ) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert(
            "frequency".to_string(),
            frequency.as_str().to_firestore_value(),
        );
        fields.insert("recurrence".to_string(), recurrence_to_value(recurrence));
        fields.insert("timezone".to_string(), timezone.to_firestore_value());
        fields.insert("posts".to_string(), posts_to_value(posts));
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

        self.client
            .update_document_with_precondition(
                SCHEDULES_COLLECTION,
                id.as_str(),
                fields,
                Some(vec![
                    "frequency".to_string(),
                    "recurrence".to_string(),
                    "timezone".to_string(),
                    "posts".to_string(),
                    "updated_at".to_string(),
                ]),
                Some(update_time),
            )
            .await?;
        Ok(())
    }
}

// =============================================================================
// Field Mapping
// =============================================================================

fn post_key(index: usize) -> String {
    format!("p{}", index)
}

/// Update-mask path addressing one field of one post.
fn post_field_path(index: usize, field: &str) -> String {
    format!("posts.p{}.{}", index, field)
}

/// Body for a masked single-post update: the field map nested under
/// `posts.p{index}`, mirroring the mask paths.
fn nested_post_body(index: usize, updates: HashMap<String, Value>) -> HashMap<String, Value> {
    let mut post_map = HashMap::new();
    post_map.insert(post_key(index), Value::map(updates));

    let mut fields = HashMap::new();
    fields.insert("posts".to_string(), Value::map(post_map));
    fields
}

fn recurrence_to_value(recurrence: &Recurrence) -> Value {
    let mut fields = HashMap::new();
    fields.insert("days".to_string(), recurrence.days.to_firestore_value());
    fields.insert("times".to_string(), recurrence.times.to_firestore_value());
    Value::map(fields)
}

fn post_to_value(post: &Post) -> Value {
    let mut fields = HashMap::new();
    fields.insert(
        "description".to_string(),
        post.description.to_firestore_value(),
    );
    fields.insert("keypoints".to_string(), post.keypoints.to_firestore_value());
    fields.insert(
        "scheduled_for".to_string(),
        post.scheduled_for.to_firestore_value(),
    );
    fields.insert(
        "status".to_string(),
        post.status.as_str().to_firestore_value(),
    );
    for platform in Platform::ALL {
        fields.insert(
            platform.caption_field().to_string(),
            post.captions.get(platform).to_firestore_value(),
        );
    }
    fields.insert(
        "caption_status".to_string(),
        post.caption_status.as_str().to_firestore_value(),
    );
    fields.insert("enhanced".to_string(), post.enhanced.to_firestore_value());
    if let Some(ref error) = post.error {
        fields.insert("error".to_string(), error.to_firestore_value());
    }
    if let Some(ref video_id) = post.video_id {
        fields.insert("video_id".to_string(), video_id.to_firestore_value());
    }
    Value::map(fields)
}

fn posts_to_value(posts: &[Post]) -> Value {
    let mut map = HashMap::new();
    for (index, post) in posts.iter().enumerate() {
        map.insert(post_key(index), post_to_value(post));
    }
    Value::map(map)
}

fn value_to_post(value: &Value) -> FirestoreResult<Post> {
    let fields = value
        .map_fields()
        .ok_or_else(|| FirestoreError::invalid_response("post entry is not a map"))?;

    let get_string = |key: &str| -> String {
        fields
            .get(key)
            .and_then(String::from_firestore_value)
            .unwrap_or_default()
    };

    let scheduled_for = fields
        .get("scheduled_for")
        .and_then(chrono::DateTime::from_firestore_value)
        .ok_or_else(|| FirestoreError::invalid_response("post missing scheduled_for"))?;

    Ok(Post {
        description: get_string("description"),
        keypoints: get_string("keypoints"),
        scheduled_for,
        status: PostStatus::parse(&get_string("status")).unwrap_or_default(),
        error: fields.get("error").and_then(String::from_firestore_value),
        video_id: fields.get("video_id").and_then(String::from_firestore_value),
        captions: CaptionSet {
            instagram_caption: get_string("instagram_caption"),
            facebook_caption: get_string("facebook_caption"),
            tiktok_caption: get_string("tiktok_caption"),
            linkedin_caption: get_string("linkedin_caption"),
            twitter_caption: get_string("twitter_caption"),
            youtube_caption: get_string("youtube_caption"),
        },
        caption_status: CaptionStatus::parse(&get_string("caption_status")).unwrap_or_default(),
        enhanced: fields
            .get("enhanced")
            .and_then(bool::from_firestore_value)
            .unwrap_or(false),
    })
}

fn posts_from_fields(fields: &HashMap<String, Value>) -> FirestoreResult<Vec<Post>> {
    let entries = match fields.get("posts").and_then(Value::map_fields) {
        Some(map) => map,
        None => return Ok(Vec::new()),
    };

    let mut indexed: Vec<(usize, Post)> = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        // Keys are "p{index}"; anything else is skipped
        let Some(index) = key.strip_prefix('p').and_then(|n| n.parse::<usize>().ok()) else {
            continue;
        };
        indexed.push((index, value_to_post(value)?));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, post)| post).collect())
}

fn schedule_to_fields(schedule: &Schedule) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert(
        "schedule_id".to_string(),
        schedule.schedule_id.as_str().to_firestore_value(),
    );
    fields.insert("user_id".to_string(), schedule.user_id.to_firestore_value());
    fields.insert("email".to_string(), schedule.email.to_firestore_value());
    fields.insert(
        "timezone".to_string(),
        schedule.timezone.to_firestore_value(),
    );
    fields.insert(
        "frequency".to_string(),
        schedule.frequency.as_str().to_firestore_value(),
    );
    fields.insert(
        "recurrence".to_string(),
        recurrence_to_value(&schedule.recurrence),
    );
    fields.insert(
        "start_date".to_string(),
        schedule.start_date.to_firestore_value(),
    );
    fields.insert(
        "end_date".to_string(),
        schedule.end_date.to_firestore_value(),
    );
    fields.insert(
        "is_active".to_string(),
        schedule.is_active.to_firestore_value(),
    );
    fields.insert(
        "status".to_string(),
        schedule.status.as_str().to_firestore_value(),
    );
    fields.insert("posts".to_string(), posts_to_value(&schedule.posts));
    fields.insert(
        "created_at".to_string(),
        schedule.created_at.to_firestore_value(),
    );
    fields.insert(
        "updated_at".to_string(),
        schedule.updated_at.to_firestore_value(),
    );
    fields
}

fn document_to_schedule(doc: &Document) -> FirestoreResult<Schedule> {
    let fields = doc
        .fields
        .as_ref()
        .ok_or_else(|| FirestoreError::invalid_response("schedule document has no fields"))?;

    let get_string = |key: &str| -> String {
        fields
            .get(key)
            .and_then(String::from_firestore_value)
            .unwrap_or_default()
    };

    let get_timestamp = |key: &str| -> Option<chrono::DateTime<Utc>> {
        fields.get(key).and_then(chrono::DateTime::from_firestore_value)
    };

    // Older documents may lack the id field; fall back to the resource name
    let schedule_id = {
        let stored = get_string("schedule_id");
        if stored.is_empty() {
            doc.doc_id().unwrap_or_default().to_string()
        } else {
            stored
        }
    };

    let frequency_raw = get_string("frequency");
    let frequency = Frequency::parse(&frequency_raw).ok_or_else(|| {
        FirestoreError::invalid_response(format!("unknown frequency: {:?}", frequency_raw))
    })?;

    let recurrence = fields
        .get("recurrence")
        .and_then(Value::map_fields)
        .map(|map| Recurrence {
            days: map
                .get("days")
                .and_then(Vec::<String>::from_firestore_value)
                .unwrap_or_default(),
            times: map
                .get("times")
                .and_then(Vec::<String>::from_firestore_value)
                .unwrap_or_default(),
        })
        .unwrap_or_default();

    let start_date = get_timestamp("start_date")
        .ok_or_else(|| FirestoreError::invalid_response("schedule missing start_date"))?;
    let end_date = get_timestamp("end_date")
        .ok_or_else(|| FirestoreError::invalid_response("schedule missing end_date"))?;

    Ok(Schedule {
        schedule_id: ScheduleId::from_string(schedule_id),
        user_id: get_string("user_id"),
        email: get_string("email"),
        timezone: get_string("timezone"),
        frequency,
        recurrence,
        start_date,
        end_date,
        is_active: fields
            .get("is_active")
            .and_then(bool::from_firestore_value)
            .unwrap_or(false),
        status: ScheduleStatus::parse(&get_string("status")).unwrap_or_default(),
        posts: posts_from_fields(fields)?,
        created_at: get_timestamp("created_at").unwrap_or_else(Utc::now),
        updated_at: get_timestamp("updated_at").unwrap_or_else(Utc::now),
    })
}

// =============================================================================
// Tests
// =============================================================================
