//! Video schedule orchestration engine.
//!
//! This crate provides:
//! - Slot planning from a recurrence rule and a trend pool
//! - Topic deduplication against the user's posting history
//! - Caption enrichment with per-post failure isolation
//! - Guarded post lifecycle transitions
//! - The video processing pipeline and its dispatch scanner

pub mod captions;
pub mod config;
pub mod dedup;
pub mod error;
pub mod external;
pub mod lifecycle;
pub mod metrics;
pub mod planner;
pub mod processing;
pub mod scanner;
pub mod service;

pub use captions::CaptionPipeline;
pub use config::EngineConfig;
pub use dedup::TopicDeduplicator;
pub use error::{EngineError, EngineResult};
pub use external::EngineDeps;
pub use lifecycle::PostLifecycle;
pub use processing::VideoOrchestrator;
pub use scanner::DuePostScanner;
pub use service::ScheduleService;
