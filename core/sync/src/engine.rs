//! Core sync engine that runs one evaluate-and-report cycle.
//!
//! A cycle is a fresh, stateless activation: it rehydrates the persisted
//! state, re-attempts any pending submission, obtains a fix, evaluates the
//! geofences, submits new attendance events, and flushes the state exactly
//! once before returning. Retries are data (a persisted counter and pending
//! event), re-attempted on the next scheduled wake, because the hosting
//! process may not survive between wakes.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use fieldmark_common::{EmployeeCode, Error, LocationFix, Result};
use fieldmark_geofence::{EvaluatorConfig, GeofenceEvaluator, GeofenceRegion, RegionStatus};
use fieldmark_location::LocationProvider;
use fieldmark_report::event::idempotency_key;
use fieldmark_report::{AttendanceEvent, AttendanceReporter, SubmitOutcome};

use crate::lock::CycleLock;
use crate::state::{FailureReason, SyncState};
use crate::store::StateStore;

/// Configuration for the sync engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Consecutive transient failures before an event is dropped.
    pub max_retries: u32,
    /// Sub-timeout for obtaining a location fix.
    pub location_timeout: Duration,
    /// Sub-timeout for one backend submission.
    pub submit_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            location_timeout: Duration::from_secs(10),
            submit_timeout: Duration::from_secs(10),
        }
    }
}

/// Outcome of one cycle invocation.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Another cycle held the single-flight lock; nothing was read or
    /// mutated.
    Skipped,
    /// The cycle ran to completion and flushed its state.
    Completed(CycleReport),
}

/// What one completed cycle did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Regions classified against the fresh fix (0 when no usable fix).
    pub regions_evaluated: usize,
    /// Submissions the backend confirmed (accepted or already held).
    pub events_submitted: usize,
    /// Submissions deferred to the next wake after a transient failure.
    pub events_deferred: usize,
    /// Failure recorded for UI display, if any.
    pub failure: Option<FailureReason>,
    /// Wall-clock duration of the cycle.
    pub duration: Duration,
}

/// How one submission attempt ended.
enum Disposition {
    /// Backend confirmed the key (accepted or duplicate).
    Confirmed,
    /// Transient failure; event kept pending for the next wake.
    Deferred,
    /// Retry budget exceeded; event abandoned.
    Dropped,
    /// Backend rejected the event; terminal, never retried.
    Rejected,
    /// Unexpected terminal error.
    Failed(Option<FailureReason>),
}

/// The attendance sync engine.
pub struct SyncEngine {
    provider: Arc<dyn LocationProvider>,
    reporter: Arc<dyn AttendanceReporter>,
    store: Arc<dyn StateStore>,
    evaluator: GeofenceEvaluator,
    evaluator_config: EvaluatorConfig,
    regions: Vec<GeofenceRegion>,
    employee_code: EmployeeCode,
    lock_path: PathBuf,
    config: EngineConfig,
}

impl SyncEngine {
    /// Create a new engine.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: Arc<dyn LocationProvider>,
        reporter: Arc<dyn AttendanceReporter>,
        store: Arc<dyn StateStore>,
        regions: Vec<GeofenceRegion>,
        employee_code: EmployeeCode,
        lock_path: PathBuf,
        evaluator_config: EvaluatorConfig,
        config: EngineConfig,
    ) -> Self {
        Self {
            provider,
            reporter,
            store,
            evaluator: GeofenceEvaluator::new(evaluator_config),
            evaluator_config,
            regions,
            employee_code,
            lock_path,
            config,
        }
    }

    /// Run one evaluate-and-report cycle.
    ///
    /// Serialized by the cross-process single-flight lock: an overlapping
    /// invocation returns `Skipped` without reading or mutating state.
    ///
    /// # Errors
    /// - `Persistence` — the state could not be read or flushed; the cycle
    ///   aborts with no state claims (the only fatal condition)
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let start = Instant::now();

        let guard = match CycleLock::try_acquire(&self.lock_path).await {
            Ok(guard) => guard,
            Err(Error::LockContention(msg)) => {
                debug!(%msg, "Cycle already in flight, skipping");
                return Ok(CycleOutcome::Skipped);
            }
            Err(e) => return Err(e),
        };

        let mut state = self.store.load().await?;
        let report = self.execute(&mut state, start).await;

        state.updated_at = Utc::now();
        self.store.save(&state).await?;
        drop(guard);

        info!(
            regions = report.regions_evaluated,
            submitted = report.events_submitted,
            deferred = report.events_deferred,
            failure = ?report.failure,
            duration_ms = report.duration.as_millis() as u64,
            "Cycle completed"
        );

        Ok(CycleOutcome::Completed(report))
    }

    /// The body of a cycle. Never touches the store; failures are recorded
    /// into `state.last_failure` instead of propagating.
    async fn execute(&self, state: &mut SyncState, start: Instant) -> CycleReport {
        let mut submitted = 0usize;
        let mut deferred = 0usize;
        let mut failure: Option<FailureReason> = None;
        // Keys abandoned this cycle; evaluation must not resurrect them.
        let mut dropped_keys: HashSet<String> = HashSet::new();

        // Re-attempt pending submissions before evaluating new transitions.
        for region_id in state.regions_with_pending() {
            let Some(event) = state.entry(&region_id).and_then(|e| e.pending_event.clone())
            else {
                continue;
            };
            let key = event.idempotency_key.clone();
            match self.attempt_submission(state, event).await {
                Disposition::Confirmed => submitted += 1,
                Disposition::Deferred => {
                    deferred += 1;
                    failure = Some(FailureReason::TransientNetwork);
                }
                Disposition::Dropped => {
                    dropped_keys.insert(key);
                    failure = Some(FailureReason::RetryBudgetExceeded);
                }
                Disposition::Rejected => failure = Some(FailureReason::BackendRejected),
                Disposition::Failed(reason) => failure = reason.or(failure),
            }
        }

        let fix = match self.obtain_fix().await {
            Ok(fix) => Some(fix),
            Err(e) => {
                warn!(error = %e, "No usable fix this cycle");
                failure = FailureReason::from_error(&e).or(failure);
                None
            }
        };

        let mut regions_evaluated = 0usize;
        if let Some(fix) = fix {
            if fix.accuracy_m > self.evaluator_config.accuracy_ceiling_m {
                warn!(
                    accuracy_m = fix.accuracy_m,
                    ceiling_m = self.evaluator_config.accuracy_ceiling_m,
                    "Fix accuracy above ceiling, skipping evaluation"
                );
                failure = Some(FailureReason::LowAccuracy);
            } else {
                let previous = state.statuses();
                let statuses = self.evaluator.evaluate(&fix, &self.regions, &previous);
                regions_evaluated = statuses.len();
                state.last_fix = Some(fix.clone());

                for status in statuses {
                    let region_id = status.region_id.clone();
                    if status.status != RegionStatus::Unknown {
                        state.entry_mut(&region_id).status = status.status;
                    }
                    if status.status != RegionStatus::Inside {
                        continue;
                    }

                    let key = idempotency_key(&self.employee_code, &region_id, fix.timestamp);
                    let entry = state.entry_mut(&region_id);
                    if entry.last_submitted_key.as_deref() == Some(key.as_str()) {
                        debug!(region = %region_id, %key, "Attendance already recorded for this bucket");
                        continue;
                    }
                    if entry
                        .pending_event
                        .as_ref()
                        .map(|e| e.idempotency_key.as_str())
                        == Some(key.as_str())
                    {
                        // Already awaiting retry on the next wake.
                        continue;
                    }
                    if dropped_keys.contains(&key) {
                        continue;
                    }

                    let event = AttendanceEvent::from_fix(
                        self.employee_code.clone(),
                        region_id,
                        &fix,
                    );
                    match self.attempt_submission(state, event).await {
                        Disposition::Confirmed => submitted += 1,
                        Disposition::Deferred => {
                            deferred += 1;
                            failure = Some(FailureReason::TransientNetwork);
                        }
                        Disposition::Dropped => {
                            dropped_keys.insert(key);
                            failure = Some(FailureReason::RetryBudgetExceeded);
                        }
                        Disposition::Rejected => {
                            failure = Some(FailureReason::BackendRejected)
                        }
                        Disposition::Failed(reason) => failure = reason.or(failure),
                    }
                }
            }
        }

        state.last_failure = failure;

        CycleReport {
            regions_evaluated,
            events_submitted: submitted,
            events_deferred: deferred,
            failure,
            duration: start.elapsed(),
        }
    }

    /// Obtain a fix, bounded by the location sub-timeout even if the
    /// provider misbehaves.
    async fn obtain_fix(&self) -> Result<LocationFix> {
        match timeout(
            self.config.location_timeout,
            self.provider.fix(self.config.location_timeout),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::LocationTimeout(format!(
                "No fix within {:?}",
                self.config.location_timeout
            ))),
        }
    }

    /// Submit one event and update the region bookkeeping.
    async fn attempt_submission(
        &self,
        state: &mut SyncState,
        event: AttendanceEvent,
    ) -> Disposition {
        let region_id = event.region_id.clone();
        let key = event.idempotency_key.clone();

        let result = match timeout(self.config.submit_timeout, self.reporter.submit(&event)).await
        {
            Ok(result) => result,
            Err(_) => Err(Error::TransientNetwork(format!(
                "Submission timed out after {:?}",
                self.config.submit_timeout
            ))),
        };

        match result {
            Ok(SubmitOutcome::Accepted) => {
                info!(region = %region_id, %key, "Attendance accepted");
                state.entry_mut(&region_id).mark_submitted(key);
                Disposition::Confirmed
            }
            Ok(SubmitOutcome::Duplicate) => {
                info!(region = %region_id, %key, "Backend already held attendance key");
                state.entry_mut(&region_id).mark_submitted(key);
                Disposition::Confirmed
            }
            Ok(SubmitOutcome::Rejected { reason }) => {
                warn!(region = %region_id, %key, %reason, "Backend rejected event, not retrying");
                state.entry_mut(&region_id).drop_pending();
                Disposition::Rejected
            }
            Err(e) if e.is_retryable() => {
                let entry = state.entry_mut(&region_id);
                let count = entry.mark_transient(event);
                if count >= self.config.max_retries {
                    warn!(
                        region = %region_id, %key, retries = count,
                        "Retry budget exceeded, dropping event"
                    );
                    entry.drop_pending();
                    Disposition::Dropped
                } else {
                    debug!(
                        region = %region_id, %key, retries = count,
                        "Transient failure, deferring to next wake"
                    );
                    Disposition::Deferred
                }
            }
            Err(e) => {
                warn!(region = %region_id, %key, error = %e, "Submission failed terminally");
                state.entry_mut(&region_id).drop_pending();
                Disposition::Failed(FailureReason::from_error(&e))
            }
        }
    }
}
