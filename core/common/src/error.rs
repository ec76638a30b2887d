//! Common error types for FieldMark.

use thiserror::Error;

/// Top-level error type for FieldMark operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Location permission was denied by the user or platform.
    #[error("Location permission denied: {0}")]
    PermissionDenied(String),

    /// The location provider did not return a fix within the timeout.
    #[error("Location timeout: {0}")]
    LocationTimeout(String),

    /// The location provider is unavailable (no fix source, hardware off).
    #[error("Location provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Fix accuracy exceeded the configured ceiling.
    #[error("Fix accuracy too low: {accuracy_m:.0}m exceeds ceiling of {ceiling_m:.0}m")]
    LowAccuracy { accuracy_m: f64, ceiling_m: f64 },

    /// Transient network failure (connection refused, timeout, 5xx).
    #[error("Transient network failure: {0}")]
    TransientNetwork(String),

    /// The backend rejected the submission (4xx/validation).
    #[error("Backend rejected submission: {0}")]
    BackendRejected(String),

    /// Consecutive transient failures exceeded the retry bound.
    #[error("Retry budget exceeded for key {0}")]
    RetryBudgetExceeded(String),

    /// Another cycle holds the single-flight lock.
    #[error("Cycle lock contention: {0}")]
    LockContention(String),

    /// Reading or writing the durable sync state failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the failure should be re-attempted on the next scheduled wake.
    ///
    /// Terminal failures are only surfaced through the persisted
    /// `last_failure` field; they never consume retry budget.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::LocationTimeout(_)
                | Error::ProviderUnavailable(_)
                | Error::TransientNetwork(_)
                | Error::LockContention(_)
        )
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::TransientNetwork("502".into()).is_retryable());
        assert!(Error::LocationTimeout("10s".into()).is_retryable());
        assert!(Error::ProviderUnavailable("gps off".into()).is_retryable());
        assert!(Error::LockContention("held".into()).is_retryable());

        assert!(!Error::PermissionDenied("denied".into()).is_retryable());
        assert!(!Error::BackendRejected("bad region".into()).is_retryable());
        assert!(!Error::LowAccuracy {
            accuracy_m: 200.0,
            ceiling_m: 50.0
        }
        .is_retryable());
        assert!(!Error::Persistence("disk full".into()).is_retryable());
    }
}
