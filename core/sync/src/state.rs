//! Persisted sync state.
//!
//! One durable record per employee/device: the last evaluated fix, the
//! per-region submission bookkeeping, and the last failure reason for UI
//! display. Exactly one writer mutates it per cycle, and the store flushes it
//! atomically before the cycle returns control to the scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use fieldmark_common::{EmployeeCode, Error, LocationFix, RegionId, Result};
use fieldmark_geofence::RegionStatus;
use fieldmark_report::AttendanceEvent;

/// Terminal or retryable failure surfaced to UI collaborators through the
/// persisted record. Never delivered as an exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    PermissionDenied,
    LocationTimeout,
    ProviderUnavailable,
    LowAccuracy,
    TransientNetwork,
    BackendRejected,
    RetryBudgetExceeded,
}

impl FailureReason {
    /// Map an engine error to a persistable reason, if it has one.
    pub fn from_error(error: &Error) -> Option<Self> {
        match error {
            Error::PermissionDenied(_) => Some(Self::PermissionDenied),
            Error::LocationTimeout(_) => Some(Self::LocationTimeout),
            Error::ProviderUnavailable(_) => Some(Self::ProviderUnavailable),
            Error::LowAccuracy { .. } => Some(Self::LowAccuracy),
            Error::TransientNetwork(_) => Some(Self::TransientNetwork),
            Error::BackendRejected(_) => Some(Self::BackendRejected),
            Error::RetryBudgetExceeded(_) => Some(Self::RetryBudgetExceeded),
            _ => None,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PermissionDenied => "permission-denied",
            Self::LocationTimeout => "location-timeout",
            Self::ProviderUnavailable => "provider-unavailable",
            Self::LowAccuracy => "low-accuracy",
            Self::TransientNetwork => "transient-network",
            Self::BackendRejected => "backend-rejected",
            Self::RetryBudgetExceeded => "retry-budget-exceeded",
        };
        write!(f, "{}", name)
    }
}

/// Per-region submission bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSyncEntry {
    /// The region this entry tracks.
    pub region_id: RegionId,
    /// Last classified status, feeding hysteresis on the next cycle.
    pub status: RegionStatus,
    /// The last key the backend confirmed (accepted or already held).
    ///
    /// Invariant: updated if and only if the reporter returned Accepted or
    /// Duplicate for that key.
    pub last_submitted_key: Option<String>,
    /// Consecutive transient failures for the pending event.
    pub retry_count: u32,
    /// Event awaiting re-submission on the next wake.
    pub pending_event: Option<AttendanceEvent>,
}

impl RegionSyncEntry {
    /// Create a fresh entry with no history.
    pub fn new(region_id: RegionId) -> Self {
        Self {
            region_id,
            status: RegionStatus::Unknown,
            last_submitted_key: None,
            retry_count: 0,
            pending_event: None,
        }
    }

    /// Record a confirmed submission (Accepted or Duplicate).
    pub fn mark_submitted(&mut self, key: String) {
        self.last_submitted_key = Some(key);
        self.pending_event = None;
        self.retry_count = 0;
    }

    /// Record a transient failure, keeping the event pending for the next
    /// wake. Returns the new consecutive failure count.
    pub fn mark_transient(&mut self, event: AttendanceEvent) -> u32 {
        self.pending_event = Some(event);
        self.retry_count += 1;
        self.retry_count
    }

    /// Abandon the pending event and reset the retry budget.
    pub fn drop_pending(&mut self) {
        self.pending_event = None;
        self.retry_count = 0;
    }

    /// Whether a submission is awaiting retry.
    pub fn has_pending(&self) -> bool {
        self.pending_event.is_some()
    }
}

/// The process-wide durable sync record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    /// The employee this record belongs to.
    pub employee_code: EmployeeCode,
    /// Last fix that was actually evaluated.
    pub last_fix: Option<LocationFix>,
    /// Bookkeeping per region.
    regions: HashMap<RegionId, RegionSyncEntry>,
    /// Last terminal or retryable failure, for UI display.
    pub last_failure: Option<FailureReason>,
    /// When the record was last flushed.
    pub updated_at: DateTime<Utc>,
}

impl SyncState {
    /// Create an empty record for an employee.
    pub fn new(employee_code: EmployeeCode) -> Self {
        Self {
            employee_code,
            last_fix: None,
            regions: HashMap::new(),
            last_failure: None,
            updated_at: Utc::now(),
        }
    }

    /// Get the entry for a region, if present.
    pub fn entry(&self, region_id: &RegionId) -> Option<&RegionSyncEntry> {
        self.regions.get(region_id)
    }

    /// Get or create the entry for a region.
    pub fn entry_mut(&mut self, region_id: &RegionId) -> &mut RegionSyncEntry {
        self.regions
            .entry(region_id.clone())
            .or_insert_with(|| RegionSyncEntry::new(region_id.clone()))
    }

    /// All entries.
    pub fn entries(&self) -> impl Iterator<Item = &RegionSyncEntry> {
        self.regions.values()
    }

    /// Last known status per region, as the evaluator expects it.
    pub fn statuses(&self) -> HashMap<RegionId, RegionStatus> {
        self.regions
            .iter()
            .map(|(id, entry)| (id.clone(), entry.status))
            .collect()
    }

    /// Region ids with a submission awaiting retry.
    pub fn regions_with_pending(&self) -> Vec<RegionId> {
        let mut ids: Vec<RegionId> = self
            .regions
            .values()
            .filter(|e| e.has_pending())
            .map(|e| e.region_id.clone())
            .collect();
        // Stable order so retries are deterministic across cycles.
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }
}
