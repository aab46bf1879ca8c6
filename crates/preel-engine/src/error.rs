//! Error types for the orchestration engine.

use preel_ai::AiError;
use preel_firestore::FirestoreError;
use preel_models::{IncompleteTrend, RecurrenceError};
use preel_notify::NotifyError;
use preel_storage::StorageError;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the schedule engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Request payload failed validation
    #[error("validation failed: {0}")]
    Validation(String),

    /// Recurrence preference could not be parsed into a rule
    #[error("invalid recurrence: {0}")]
    Recurrence(#[from] RecurrenceError),

    /// A generated trend is missing required content
    #[error("unusable trend: {0}")]
    IncompleteTrend(#[from] IncompleteTrend),

    /// Schedule document does not exist
    #[error("schedule not found: {0}")]
    ScheduleNotFound(String),

    /// Post index is out of range for the schedule
    #[error("post {index} not found in schedule {schedule_id}")]
    PostNotFound { schedule_id: String, index: usize },

    /// The user already has a live schedule
    #[error("user {0} already has an active schedule")]
    ActiveScheduleExists(String),

    /// Edits are only allowed while a post is still pending
    #[error("post {index} is not editable in state {state}")]
    PostNotEditable { index: usize, state: &'static str },

    /// Another worker holds the post
    #[error("post {index} is already being processed")]
    AlreadyProcessing { index: usize },

    /// The post already reached a terminal state
    #[error("post {index} already finished as {state}")]
    AlreadyFinished { index: usize, state: &'static str },

    /// Requested lifecycle move is not allowed
    #[error("invalid post transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    /// Guarded writes kept losing to concurrent writers
    #[error("gave up on {0} after repeated version conflicts")]
    Contention(String),

    /// Firestore error
    #[error("Firestore error: {0}")]
    Firestore(#[from] FirestoreError),

    /// Object storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Upstream generation service error
    #[error("Generation service error: {0}")]
    Ai(#[from] AiError),

    /// Notification or email delivery error
    #[error("Notify error: {0}")]
    Notify(#[from] NotifyError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl EngineError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    /// Create a schedule-not-found error
    pub fn schedule_not_found(id: impl Into<String>) -> Self {
        EngineError::ScheduleNotFound(id.into())
    }

    /// Create a post-not-found error
    pub fn post_not_found(schedule_id: impl Into<String>, index: usize) -> Self {
        EngineError::PostNotFound {
            schedule_id: schedule_id.into(),
            index,
        }
    }

    /// Create a contention error
    pub fn contention(what: impl Into<String>) -> Self {
        EngineError::Contention(what.into())
    }

    /// Create a configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        EngineError::ConfigError(msg.into())
    }

    /// Whether the error is a lifecycle or uniqueness conflict the caller
    /// should surface as a 409-style outcome rather than a failure.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            EngineError::ActiveScheduleExists(_)
                | EngineError::PostNotEditable { .. }
                | EngineError::AlreadyProcessing { .. }
                | EngineError::AlreadyFinished { .. }
                | EngineError::InvalidTransition { .. }
        )
    }

    /// Whether the error means a referenced document is missing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::ScheduleNotFound(_) | EngineError::PostNotFound { .. }
        )
    }

    /// Whether a guarded write lost to a concurrent writer and can be
    /// retried against a fresh read.
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, EngineError::Firestore(e) if e.is_precondition_failed())
    }

    /// Whether the caller supplied a bad request.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::Validation(_) | EngineError::Recurrence(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_classification() {
        assert!(EngineError::AlreadyProcessing { index: 2 }.is_conflict());
        assert!(EngineError::AlreadyFinished {
            index: 0,
            state: "completed"
        }
        .is_conflict());
        assert!(!EngineError::schedule_not_found("s1").is_conflict());
        assert!(EngineError::schedule_not_found("s1").is_not_found());
    }

    #[test]
    fn test_version_conflict_detection() {
        let conflict =
            EngineError::Firestore(FirestoreError::PreconditionFailed("stale".to_string()));
        assert!(conflict.is_version_conflict());

        let other = EngineError::Firestore(FirestoreError::RequestFailed("boom".to_string()));
        assert!(!other.is_version_conflict());
    }

    #[test]
    fn test_validation_classification() {
        assert!(EngineError::validation("empty user id").is_validation());
        assert!(EngineError::Recurrence(RecurrenceError::EmptyTimes).is_validation());
        assert!(!EngineError::contention("post claim").is_validation());
    }
}
