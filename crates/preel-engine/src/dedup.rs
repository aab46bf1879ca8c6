//! Unique-topic pool assembly.
//!
//! Trends come back from the generator in batches and regularly repeat
//! topics the user already posted about. The deduplicator keeps asking
//! for over-sized chunks, filters against everything seen so far and
//! stops once the pool is full or the attempt budget is spent.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use preel_models::Trend;

use crate::error::EngineResult;
use crate::external::{TopicHistory, TrendGenerator};

/// Most topics taken per chunk.
const CHUNK_SIZE: u32 = 5;

/// Chunks request double the needed count to survive duplicate losses.
const OVER_REQUEST_FACTOR: u32 = 2;

/// Batches that filter down to nothing before giving up.
const MAX_ATTEMPTS: u32 = 10;

/// Wait after a batch filtered down to nothing.
const EMPTY_BATCH_BACKOFF: Duration = Duration::from_secs(1);

/// Wait between successful chunks.
const INTER_CHUNK_PAUSE: Duration = Duration::from_secs(1);

/// Builds pools of trends whose titles the user has not covered yet.
#[derive(Clone)]
pub struct TopicDeduplicator {
    trends: Arc<dyn TrendGenerator>,
    history: Arc<dyn TopicHistory>,
}

impl TopicDeduplicator {
    pub fn new(trends: Arc<dyn TrendGenerator>, history: Arc<dyn TopicHistory>) -> Self {
        Self { trends, history }
    }

    /// Assemble up to `target` trends with unique normalized titles.
    ///
    /// The seen-set starts from the user's topic history, so the pool
    /// never repeats a past post. A short pool is returned as-is once
    /// the attempt budget runs out; the caller decides whether fewer
    /// posts are acceptable.
    pub async fn fill(
        &self,
        target: u32,
        user_id: &str,
        email: &str,
        seed: Option<&str>,
    ) -> EngineResult<Vec<Trend>> {
        let mut seen = self.history.existing_titles(user_id, email).await?;
        debug!(
            user_id,
            known_titles = seen.len(),
            target,
            "Filling topic pool"
        );

        let mut pool: Vec<Trend> = Vec::with_capacity(target as usize);
        let mut attempts = 0u32;

        while (pool.len() as u32) < target && attempts < MAX_ATTEMPTS {
            let remaining = target - pool.len() as u32;
            let batch_size = remaining.min(CHUNK_SIZE) * OVER_REQUEST_FACTOR;

            let candidates = self.trends.generate(batch_size, seed).await?;
            let fresh: Vec<Trend> = candidates
                .into_iter()
                .filter(|trend| !seen.contains(&trend.normalized_title()))
                .collect();

            if fresh.is_empty() {
                attempts += 1;
                debug!(
                    attempt = attempts,
                    "Trend batch filtered down to nothing, backing off"
                );
                tokio::time::sleep(EMPTY_BATCH_BACKOFF).await;
                continue;
            }

            for trend in fresh {
                if pool.len() as u32 >= target {
                    break;
                }
                if seen.insert(trend.normalized_title()) {
                    pool.push(trend);
                }
            }

            if (pool.len() as u32) < target {
                tokio::time::sleep(INTER_CHUNK_PAUSE).await;
            }
        }

        if (pool.len() as u32) < target {
            warn!(
                user_id,
                got = pool.len(),
                target,
                attempts,
                "Topic pool is short, proceeding with fewer posts"
            );
        }

        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use preel_models::{normalize_title, CaptionSet};
    use std::collections::{HashSet, VecDeque};
    use std::sync::Mutex;

    fn trend(title: &str) -> Trend {
        Trend {
            description: title.to_string(),
            keypoints: format!("{} points", title),
            captions: CaptionSet::placeholder(title, "points"),
        }
    }

    struct ScriptedTrends {
        batches: Mutex<VecDeque<Vec<Trend>>>,
        requested: Mutex<Vec<u32>>,
    }

    impl ScriptedTrends {
        fn new(batches: Vec<Vec<Trend>>) -> Arc<Self> {
            Arc::new(Self {
                batches: Mutex::new(batches.into()),
                requested: Mutex::new(Vec::new()),
            })
        }

        fn requested(&self) -> Vec<u32> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TrendGenerator for ScriptedTrends {
        async fn generate(&self, count: u32, _seed: Option<&str>) -> EngineResult<Vec<Trend>> {
            self.requested.lock().unwrap().push(count);
            Ok(self
                .batches
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default())
        }

        async fn keypoints(&self, _topic: &str) -> EngineResult<String> {
            Ok("unused".to_string())
        }
    }

    struct FixedHistory(HashSet<String>);

    impl FixedHistory {
        fn of(titles: &[&str]) -> Arc<Self> {
            Arc::new(Self(
                titles.iter().map(|t| normalize_title(t)).collect(),
            ))
        }
    }

    #[async_trait]
    impl TopicHistory for FixedHistory {
        async fn existing_titles(
            &self,
            _user_id: &str,
            _email: &str,
        ) -> EngineResult<HashSet<String>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_topics_are_filtered_out() {
        let generator = ScriptedTrends::new(vec![vec![
            trend("Staging on a budget"),
            trend("Open house checklist"),
            trend("Pricing psychology"),
        ]]);
        let history = FixedHistory::of(&["Staging On A  Budget"]);

        let dedup = TopicDeduplicator::new(generator.clone(), history);
        let pool = dedup.fill(2, "u1", "a@b.c", None).await.unwrap();

        let titles: Vec<_> = pool.iter().map(|t| t.normalized_title()).collect();
        assert_eq!(
            titles,
            vec!["open house checklist", "pricing psychology"]
        );
        // min(5, remaining=2) doubled
        assert_eq!(generator.requested(), vec![4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunks_shrink_as_the_pool_fills() {
        let generator = ScriptedTrends::new(vec![
            (0..4).map(|i| trend(&format!("First wave {}", i))).collect(),
            vec![
                trend("First wave 0"),
                trend("Second wave 0"),
                trend("Second wave 1"),
                trend("Second wave 2"),
            ],
        ]);
        let history = FixedHistory::of(&[]);

        let dedup = TopicDeduplicator::new(generator.clone(), history);
        let pool = dedup.fill(6, "u1", "a@b.c", None).await.unwrap();

        assert_eq!(pool.len(), 6);
        let unique: HashSet<_> = pool.iter().map(|t| t.normalized_title()).collect();
        assert_eq!(unique.len(), 6, "pool must never repeat a title");
        // First chunk: min(5, 6) * 2; second: min(5, 2) * 2
        assert_eq!(generator.requested(), vec![10, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_within_batch_duplicates_collapse() {
        let generator = ScriptedTrends::new(vec![vec![
            trend("Curb appeal wins"),
            trend("  curb APPEAL wins "),
            trend("Mortgage rate myths"),
        ]]);
        let history = FixedHistory::of(&[]);

        let dedup = TopicDeduplicator::new(generator, history);
        let pool = dedup.fill(5, "u1", "a@b.c", None).await.unwrap();

        let titles: Vec<_> = pool.iter().map(|t| t.normalized_title()).collect();
        assert_eq!(titles, vec!["curb appeal wins", "mortgage rate myths"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_pool_after_attempt_budget() {
        // Every batch repeats a covered topic and filters to nothing
        let batches = (0..12).map(|_| vec![trend("Old news")]).collect();
        let generator = ScriptedTrends::new(batches);
        let history = FixedHistory::of(&["Old news"]);

        let dedup = TopicDeduplicator::new(generator.clone(), history);
        let pool = dedup.fill(3, "u1", "a@b.c", None).await.unwrap();

        assert!(pool.is_empty());
        assert_eq!(generator.requested().len(), MAX_ATTEMPTS as usize);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_capped_at_target() {
        let generator = ScriptedTrends::new(vec![(0..10)
            .map(|i| trend(&format!("Plenty {}", i)))
            .collect()]);
        let history = FixedHistory::of(&[]);

        let dedup = TopicDeduplicator::new(generator, history);
        let pool = dedup.fill(3, "u1", "a@b.c", None).await.unwrap();

        assert_eq!(pool.len(), 3);
    }
}
