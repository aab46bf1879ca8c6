//! Firestore REST API client and schedule repositories.
//!
//! This crate provides:
//! - A tuned REST client with token caching, retries and metrics
//! - Schedule repository with targeted per-post field updates
//! - Subscription, user settings and topic history repositories
//! - Optimistic concurrency via document update-time preconditions

pub mod auth;
pub mod client;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod schedules;
pub mod types;
pub mod users;

#[cfg(test)]
mod client_tests;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use retry::{with_retry, RetryConfig};
pub use schedules::{ScheduleRepository, VersionedSchedule};
pub use types::{Document, Filter, FromFirestoreValue, StructuredQuery, ToFirestoreValue, Value};
pub use users::{SubscriptionRepository, TopicHistoryRepository, UserSettingsRepository};
