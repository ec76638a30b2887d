//! Attendance event reporting for FieldMark.
//!
//! Builds attendance events with deterministic idempotency keys and submits
//! them to the backend through the [`AttendanceReporter`] port. The backend
//! deduplicates by key; the client's job is to derive a stable key and pass
//! it unchanged on every resubmission.

pub mod event;
pub mod http;
pub mod memory;
pub mod reporter;

pub use event::AttendanceEvent;
pub use http::{CredentialSource, HttpReporter, StaticCredential};
pub use memory::MemoryReporter;
pub use reporter::{AttendanceReporter, SubmitOutcome};
