//! Video processing for a single due post.
//!
//! One call takes a pending post through claim, account gates, script
//! enhancement, optional voice and music, and the generation submission.
//! Generation itself is asynchronous on the remote side; the post stays
//! in processing until the completion callback lands in
//! [`crate::service::ScheduleService::update_post_status`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use preel_ai::{CreateVideoRequest, GenerateVideoRequest, SpeechRequest};
use preel_models::{NotifyEvent, ScheduleId, UserVideoSettings};
use preel_notify::EmailTemplate;

use crate::error::EngineResult;
use crate::external::{
    EngineDeps, MailSender, MusicResolver, Notifier, SettingsReader, SpeechSynthesizer,
    SubscriptionReader, VideoApi,
};
use crate::lifecycle::PostLifecycle;
use crate::metrics;

/// Stored on the post when the subscription gate rejects it.
const NO_SUBSCRIPTION_MESSAGE: &str = "No active subscription";

/// Budget for emails and notifications; they must never stall a worker.
const SIDE_EFFECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the full processing flow for one claimed post.
#[derive(Clone)]
pub struct VideoOrchestrator {
    lifecycle: PostLifecycle,
    subscriptions: Arc<dyn SubscriptionReader>,
    settings: Arc<dyn SettingsReader>,
    video: Arc<dyn VideoApi>,
    speech: Arc<dyn SpeechSynthesizer>,
    music: Arc<dyn MusicResolver>,
    notifier: Arc<dyn Notifier>,
    mailer: Arc<dyn MailSender>,
}

impl VideoOrchestrator {
    pub fn new(deps: &EngineDeps) -> Self {
        Self {
            lifecycle: PostLifecycle::new(Arc::clone(&deps.store)),
            subscriptions: Arc::clone(&deps.subscriptions),
            settings: Arc::clone(&deps.settings),
            video: Arc::clone(&deps.video),
            speech: Arc::clone(&deps.speech),
            music: Arc::clone(&deps.music),
            notifier: Arc::clone(&deps.notifier),
            mailer: Arc::clone(&deps.mailer),
        }
    }

    /// Process one due post end to end.
    ///
    /// Claim conflicts surface as errors so the caller can tell a race
    /// from a failure. Everything after the claim is recorded on the
    /// post itself: gate rejections and generation errors mark it
    /// failed, a successful submission leaves it processing.
    pub async fn process(&self, id: &ScheduleId, index: usize) -> EngineResult<()> {
        let schedule = self.lifecycle.claim_for_processing(id, index).await?;
        let post = schedule.posts[index].clone();
        let user_id = schedule.user_id.clone();
        let email = schedule.email.clone();

        info!(
            schedule_id = %id,
            index,
            topic = %post.description,
            "Claimed post for processing"
        );

        // Account gates come before any expensive generation work
        match self.subscriptions.active_subscription(&user_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.fail_post(id, index, &user_id, NO_SUBSCRIPTION_MESSAGE)
                    .await?;
                best_effort(
                    "Subscription expired email",
                    self.mailer.send(
                        &email,
                        EmailTemplate::SubscriptionExpired,
                        serde_json::json!({}),
                    ),
                )
                .await;
                metrics::record_post_processed("subscription_gate");
                return Ok(());
            }
            Err(e) => {
                self.fail_post(
                    id,
                    index,
                    &user_id,
                    &format!("Subscription check failed: {}", e),
                )
                .await?;
                metrics::record_post_processed("gate_error");
                return Ok(());
            }
        }

        let quota = match self.subscriptions.can_create_video(&user_id).await {
            Ok(quota) => quota,
            Err(e) => {
                self.fail_post(id, index, &user_id, &format!("Quota check failed: {}", e))
                    .await?;
                metrics::record_post_processed("gate_error");
                return Ok(());
            }
        };
        if !quota.can_create {
            let summary = quota.usage_summary();
            self.fail_post(id, index, &user_id, &summary).await?;
            best_effort(
                "Limit reached email",
                self.mailer.send(
                    &email,
                    EmailTemplate::LimitReached,
                    serde_json::json!({ "summary": summary }),
                ),
            )
            .await;
            metrics::record_post_processed("quota_gate");
            return Ok(());
        }

        let settings = match self.settings.video_settings(&user_id).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    error = %e,
                    "Falling back to default video settings"
                );
                UserVideoSettings::default()
            }
        };

        best_effort(
            "Processing started email",
            self.mailer.send(
                &email,
                EmailTemplate::ProcessingStarted,
                serde_json::json!({ "topic": post.description.as_str() }),
            ),
        )
        .await;
        let started = NotifyEvent::post_processing(id.as_str(), index as u32, post.description.as_str());
        best_effort(
            "Post processing notification",
            self.notifier.notify(&user_id, &started),
        )
        .await;

        // Script enhancement is the first hard dependency
        let create_request = CreateVideoRequest {
            user_id: user_id.clone(),
            topic: post.description.clone(),
            keypoints: post.keypoints.clone(),
            context: settings.context.clone(),
            language: settings.context.language.clone(),
        };
        let script = match self.video.create_video(&create_request).await {
            Ok(script) => script,
            Err(e) => {
                error!(schedule_id = %id, index, error = %e, "Script generation failed");
                self.fail_post(
                    id,
                    index,
                    &user_id,
                    &format!("Script generation failed: {}", e),
                )
                .await?;
                metrics::record_post_processed("create_failed");
                return Ok(());
            }
        };

        // Voice and music are enhancements, not prerequisites
        let audio = match &settings.voice_id {
            Some(voice_id) => {
                let request =
                    SpeechRequest::for_script(voice_id.clone(), &script, settings.voice_settings());
                match self.speech.synthesize(&request).await {
                    Ok(urls) => Some(urls),
                    Err(e) => {
                        warn!(
                            schedule_id = %id,
                            index,
                            error = %e,
                            "Speech synthesis failed, continuing with text script"
                        );
                        None
                    }
                }
            }
            None => None,
        };

        let music_url = match settings.music_track.as_deref() {
            Some(track) => match self.music.resolve_track(track).await {
                Ok(url) => url,
                Err(e) => {
                    warn!(
                        schedule_id = %id,
                        index,
                        error = %e,
                        "Music resolution failed, continuing without track"
                    );
                    None
                }
            },
            None => None,
        };

        let audio_ready = audio.is_some();
        let (hook, body, conclusion) = match audio {
            Some(urls) => (urls.hook_url, urls.body_url, urls.conclusion_url),
            None => (script.hook, script.body, script.conclusion),
        };

        let generate_request = GenerateVideoRequest {
            user_id: user_id.clone(),
            schedule_id: id.as_str().to_string(),
            post_index: index,
            avatar: settings.avatar(),
            voice_id: settings.voice_id.clone(),
            hook,
            body,
            conclusion,
            audio_ready,
            music_url,
            captions: post.captions.clone(),
            language: settings.context.language.clone(),
        };
        match self.video.generate_video(&generate_request).await {
            Ok(ack) => {
                info!(
                    schedule_id = %id,
                    index,
                    status = %ack.status,
                    video_id = ?ack.video_id,
                    "Video generation accepted"
                );
            }
            Err(e) => {
                error!(schedule_id = %id, index, error = %e, "Video generation submission failed");
                self.fail_post(
                    id,
                    index,
                    &user_id,
                    &format!("Video generation failed: {}", e),
                )
                .await?;
                metrics::record_post_processed("generate_failed");
                return Ok(());
            }
        }

        // The post stays processing until the completion callback arrives
        let initiated = NotifyEvent::video_initiated(id.as_str(), index as u32);
        best_effort(
            "Video initiated notification",
            self.notifier.notify(&user_id, &initiated),
        )
        .await;
        metrics::record_post_processed("initiated");

        Ok(())
    }

    /// Mark the claimed post failed and tell the user.
    async fn fail_post(
        &self,
        id: &ScheduleId,
        index: usize,
        user_id: &str,
        message: &str,
    ) -> EngineResult<()> {
        self.lifecycle.record_failure(id, index, message).await?;
        let event = NotifyEvent::post_failed(id.as_str(), index as u32, message);
        best_effort(
            "Post failed notification",
            self.notifier.notify(user_id, &event),
        )
        .await;
        Ok(())
    }
}

/// Run a side effect under a timeout, logging instead of propagating.
pub(crate) async fn best_effort<F>(what: &str, effect: F)
where
    F: Future<Output = EngineResult<()>>,
{
    match tokio::time::timeout(SIDE_EFFECT_TIMEOUT, effect).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "{} failed", what),
        Err(_) => warn!(
            timeout_secs = SIDE_EFFECT_TIMEOUT.as_secs(),
            "{} timed out", what
        ),
    }
}
