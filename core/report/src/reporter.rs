//! Attendance reporter trait definition.

use async_trait::async_trait;

use fieldmark_common::Result;

use crate::event::AttendanceEvent;

/// Backend verdict on a submission.
///
/// Transport-level failures (connection refused, timeout, 5xx) surface as
/// `Err(Error::TransientNetwork)` instead, so callers can tell "the backend
/// answered" apart from "the backend was unreachable".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The backend recorded a new attendance row for this key.
    Accepted,
    /// The backend already held this key; nothing new was recorded.
    Duplicate,
    /// The backend rejected the event (validation). Terminal for the event;
    /// must be logged, never retried.
    Rejected {
        reason: String,
    },
}

/// Submits attendance events to the backend.
///
/// The backend call is idempotent keyed by `event.idempotency_key`:
/// resubmitting a key after a prior `Accepted` yields `Duplicate`. That is a
/// backend contract the client relies on but does not enforce beyond passing
/// the stable key.
#[async_trait]
pub trait AttendanceReporter: Send + Sync {
    /// Get the reporter name (e.g., "http", "memory").
    fn name(&self) -> &str;

    /// Submit one event.
    ///
    /// # Errors
    /// - `TransientNetwork` — retryable on the next scheduled wake
    async fn submit(&self, event: &AttendanceEvent) -> Result<SubmitOutcome>;
}
