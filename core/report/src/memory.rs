//! In-memory attendance reporter for testing.

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use fieldmark_common::Result;

use crate::event::AttendanceEvent;
use crate::reporter::{AttendanceReporter, SubmitOutcome};

/// In-memory reporter.
///
/// Mimics the backend's idempotency contract: the first submission of a key
/// is `Accepted`, any later one `Duplicate`. Outcomes can also be scripted to
/// simulate transient failures and rejections.
#[derive(Default)]
pub struct MemoryReporter {
    accepted_keys: Mutex<HashSet<String>>,
    submissions: Mutex<Vec<AttendanceEvent>>,
    script: Mutex<VecDeque<Result<SubmitOutcome>>>,
}

impl MemoryReporter {
    /// Create an empty reporter with the default idempotent behavior.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue scripted outcomes consumed before the default behavior.
    pub fn push_outcome(&self, outcome: Result<SubmitOutcome>) {
        self.script.lock().unwrap().push_back(outcome);
    }

    /// All events that reached the reporter, in order.
    pub fn submissions(&self) -> Vec<AttendanceEvent> {
        self.submissions.lock().unwrap().clone()
    }

    /// Number of distinct keys the backend has accepted.
    pub fn accepted_count(&self) -> usize {
        self.accepted_keys.lock().unwrap().len()
    }
}

#[async_trait]
impl AttendanceReporter for MemoryReporter {
    fn name(&self) -> &str {
        "memory"
    }

    async fn submit(&self, event: &AttendanceEvent) -> Result<SubmitOutcome> {
        self.submissions.lock().unwrap().push(event.clone());

        if let Some(scripted) = self.script.lock().unwrap().pop_front() {
            return scripted;
        }

        let mut accepted = self.accepted_keys.lock().unwrap();
        if accepted.contains(&event.idempotency_key) {
            Ok(SubmitOutcome::Duplicate)
        } else {
            accepted.insert(event.idempotency_key.clone());
            Ok(SubmitOutcome::Accepted)
        }
    }
}
