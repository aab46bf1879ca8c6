//! In-app notification events via Redis Pub/Sub.

use redis::AsyncCommands;
use tracing::debug;

use preel_models::NotifyEvent;

use crate::error::NotifyResult;

/// Channel for publishing/subscribing to per-user notification events.
pub struct NotifyChannel {
    client: redis::Client,
}

impl NotifyChannel {
    /// Create a new notification channel.
    pub fn new(redis_url: &str) -> NotifyResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// Create from the `REDIS_URL` environment variable.
    pub fn from_env() -> NotifyResult<Self> {
        let redis_url = std::env::var("REDIS_URL")
            .unwrap_or_else(|_| "redis://localhost:6379".to_string());
        Self::new(&redis_url)
    }

    /// Get the channel name for a user.
    pub fn channel_name(user_id: &str) -> String {
        format!("notify:{}", user_id)
    }

    /// Publish an event to a user's channel.
    pub async fn publish(&self, user_id: &str, event: &NotifyEvent) -> NotifyResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let channel = Self::channel_name(user_id);
        let payload = serde_json::to_string(event)?;

        debug!("Publishing {} event to {}", event.event_type().as_str(), channel);
        conn.publish::<_, _, ()>(channel, payload).await?;

        Ok(())
    }

    /// Subscribe to a user's notification events.
    /// Returns a pinned stream that can be polled with `.next()`.
    pub async fn subscribe(
        &self,
        user_id: &str,
    ) -> NotifyResult<std::pin::Pin<Box<dyn futures_util::Stream<Item = NotifyEvent> + Send>>>
    {
        use futures_util::StreamExt;

        let mut pubsub = self.client.get_async_pubsub().await?;
        let channel = Self::channel_name(user_id);

        pubsub.subscribe(&channel).await?;

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = msg.get_payload().ok()?;
            serde_json::from_str(&payload).ok()
        });

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_name() {
        assert_eq!(NotifyChannel::channel_name("user_1"), "notify:user_1");
    }

    #[test]
    fn test_event_payload_shape() {
        let event = NotifyEvent::video_initiated("sched_1", 3);
        let payload = serde_json::to_string(&event).unwrap();
        assert!(payload.contains("\"type\":\"video_initiated\""));
        assert!(payload.contains("\"scheduleId\":\"sched_1\""));
        assert!(payload.contains("\"postIndex\":3"));
    }
}
