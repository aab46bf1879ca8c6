//! Metrics for the orchestration engine.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Metric names exported by this crate.
pub mod names {
    pub const SCHEDULES_CREATED_TOTAL: &str = "engine_schedules_created_total";
    pub const CAPTIONS_ENRICHED_TOTAL: &str = "engine_captions_enriched_total";
    pub const POSTS_PROCESSED_TOTAL: &str = "engine_posts_processed_total";
    pub const DUE_POSTS_DISPATCHED_TOTAL: &str = "engine_due_posts_dispatched_total";
    pub const SCAN_DURATION_SECONDS: &str = "engine_scan_duration_seconds";
}

/// Install the Prometheus exporter with its scrape listener.
///
/// The listener binds the exporter's default address; override it with
/// the exporter's standard environment configuration when deploying.
pub fn init_metrics() {
    PrometheusBuilder::new()
        .install()
        .expect("Failed to install Prometheus exporter");
}

/// Record a schedule successfully created.
pub fn record_schedule_created(frequency: &str) {
    counter!(
        names::SCHEDULES_CREATED_TOTAL,
        "frequency" => frequency.to_string()
    )
    .increment(1);
}

/// Record one post's caption enrichment outcome.
pub fn record_caption_enriched(status: &str) {
    counter!(
        names::CAPTIONS_ENRICHED_TOTAL,
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record one processing run of a due post.
pub fn record_post_processed(outcome: &str) {
    counter!(
        names::POSTS_PROCESSED_TOTAL,
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record posts handed to workers by one scan.
pub fn record_due_dispatched(count: u64) {
    counter!(names::DUE_POSTS_DISPATCHED_TOTAL).increment(count);
}

/// Record how long one due-post scan took.
pub fn record_scan_duration(duration_secs: f64) {
    histogram!(names::SCAN_DURATION_SECONDS).record(duration_secs);
}
