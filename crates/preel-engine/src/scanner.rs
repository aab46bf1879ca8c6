//! Background scanner that dispatches due posts.
//!
//! Runs periodically to:
//! - Collect pending posts whose slot falls inside the lead window
//! - Hand each one to the video pipeline, bounded by a concurrency cap
//! - Log posts another worker already claimed without treating them
//!   as failures

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::time::interval;
use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::metrics;
use crate::service::ScheduleService;

/// Scans active schedules and hands due posts to the video pipeline.
pub struct DuePostScanner {
    service: Arc<ScheduleService>,
    scan_interval: Duration,
    lead_minutes: i64,
    permits: Arc<Semaphore>,
    enabled: bool,
}

impl DuePostScanner {
    /// Create a scanner over the shared service.
    pub fn new(service: Arc<ScheduleService>, config: &EngineConfig) -> Self {
        Self {
            service,
            scan_interval: config.scan_interval,
            lead_minutes: config.due_lead_minutes,
            permits: Arc::new(Semaphore::new(config.max_concurrent_posts)),
            enabled: config.scanner_enabled,
        }
    }

    /// Start the scan loop.
    ///
    /// This function runs indefinitely and should be spawned as a
    /// background task.
    pub async fn run(&self) {
        if !self.enabled {
            info!("Due post scanner is disabled");
            return;
        }

        info!(
            "Starting due post scanner (interval: {:?})",
            self.scan_interval
        );

        let mut ticker = interval(self.scan_interval);

        loop {
            ticker.tick().await;

            if let Err(e) = self.scan_and_dispatch().await {
                error!("Due post scan error: {}", e);
            }
        }
    }

    /// Run a single scan cycle, dispatching every due post.
    async fn scan_and_dispatch(&self) -> EngineResult<()> {
        let started = Instant::now();
        let due = self.service.get_due_posts(self.lead_minutes).await?;

        if due.is_empty() {
            metrics::record_scan_duration(started.elapsed().as_secs_f64());
            return Ok(());
        }

        info!(due = due.len(), "Dispatching due posts");
        metrics::record_due_dispatched(due.len() as u64);

        for item in due {
            let permit = match self.permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let service = Arc::clone(&self.service);

            tokio::spawn(async move {
                let _permit = permit;
                match service
                    .process_scheduled_post(&item.schedule_id, item.post_index)
                    .await
                {
                    Ok(()) => {}
                    Err(e) if e.is_conflict() => {
                        debug!(
                            schedule_id = %item.schedule_id,
                            index = item.post_index,
                            "Post already taken: {}", e
                        );
                    }
                    Err(e) => {
                        error!(
                            schedule_id = %item.schedule_id,
                            index = item.post_index,
                            "Post processing failed: {}", e
                        );
                    }
                }
            });
        }

        metrics::record_scan_duration(started.elapsed().as_secs_f64());
        Ok(())
    }

    /// Run a single scan inline (for testing or manual invocation).
    ///
    /// Returns the number of posts that were due.
    pub async fn check_once(&self) -> EngineResult<u32> {
        let due = self.service.get_due_posts(self.lead_minutes).await?;
        let count = due.len() as u32;

        for item in due {
            if let Err(e) = self
                .service
                .process_scheduled_post(&item.schedule_id, item.post_index)
                .await
            {
                if e.is_conflict() {
                    debug!(
                        schedule_id = %item.schedule_id,
                        index = item.post_index,
                        "Post already taken: {}", e
                    );
                } else {
                    error!(
                        schedule_id = %item.schedule_id,
                        index = item.post_index,
                        "Post processing failed: {}", e
                    );
                }
            }
        }

        Ok(count)
    }
}
