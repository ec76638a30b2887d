//! Background scheduling under an OS execution budget.
//!
//! The scheduler owns no sync logic: it decides *when* a cycle runs and
//! enforces the wall-clock budget the host OS grants a background task. Every
//! invocation, scheduled or manual, finishes with a [`TaskCompletion`] so the
//! host can account for the task. Missed ticks are absorbed rather than
//! replayed: catching up on skipped wakes would burst-submit against the
//! backend for no benefit.
//!
//! Headless activations (the host waking the app with no UI) go through
//! [`run_headless`], which runs exactly one budgeted cycle against rehydrated
//! state and returns.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use fieldmark_common::{Error, Result};

use crate::engine::CycleOutcome;

/// Scheduling contract declared to the host.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Minimum gap between scheduled cycles.
    pub min_interval: Duration,
    /// Only run when the device has connectivity.
    pub requires_network: bool,
    /// Keep running while the app is backgrounded.
    pub run_in_background: bool,
    /// Wall-clock budget for one cycle, after which the task is abandoned.
    pub cycle_budget: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(15 * 60),
            requires_network: true,
            run_in_background: true,
            cycle_budget: Duration::from_secs(30),
        }
    }
}

/// How a budgeted invocation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// The cycle completed and flushed its state.
    Success,
    /// Another cycle held the single-flight lock.
    Skipped,
    /// The cycle failed or exhausted its budget.
    Failure,
}

/// Completion record handed back to the host for every invocation.
#[derive(Debug, Clone)]
pub struct TaskCompletion {
    pub task_id: String,
    pub status: TaskStatus,
    pub duration: Duration,
}

enum Command {
    Manual(oneshot::Sender<TaskCompletion>),
    Shutdown,
}

/// Client half of the scheduler: triggers manual cycles and shuts the loop
/// down.
pub struct BackgroundScheduler {
    commands: mpsc::Sender<Command>,
}

/// Loop half of the scheduler, consumed by [`SchedulerHandle::run`].
pub struct SchedulerHandle {
    config: SchedulerConfig,
    commands: mpsc::Receiver<Command>,
}

impl BackgroundScheduler {
    /// Create the scheduler pair.
    pub fn new(config: SchedulerConfig) -> (Self, SchedulerHandle) {
        let (tx, rx) = mpsc::channel(8);
        (
            Self { commands: tx },
            SchedulerHandle {
                config,
                commands: rx,
            },
        )
    }

    /// Run one cycle now, outside the scheduled cadence, and wait for its
    /// completion. The single-flight lock still applies: a manual trigger
    /// overlapping a scheduled cycle completes as `Skipped`.
    ///
    /// # Errors
    /// - `InvalidInput` — the scheduler loop is no longer running
    pub async fn trigger_manual(&self) -> Result<TaskCompletion> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Manual(reply_tx))
            .await
            .map_err(|_| Error::InvalidInput("Scheduler is not running".to_string()))?;
        reply_rx
            .await
            .map_err(|_| Error::InvalidInput("Scheduler stopped mid-cycle".to_string()))
    }

    /// Stop the scheduler loop after the current cycle, if any.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }
}

impl SchedulerHandle {
    /// Drive the scheduling loop until shutdown.
    ///
    /// Scheduled cycles fire every `min_interval`; ticks missed while a slow
    /// cycle runs are delayed, not replayed.
    pub async fn run<F, Fut>(mut self, cycle_fn: F)
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<CycleOutcome>>,
    {
        info!(
            min_interval_secs = self.config.min_interval.as_secs(),
            requires_network = self.config.requires_network,
            run_in_background = self.config.run_in_background,
            cycle_budget_secs = self.config.cycle_budget.as_secs(),
            "Scheduler started"
        );

        let mut ticker = interval(self.config.min_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; consume it so the first
        // scheduled cycle honors the minimum interval.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let task_id = Uuid::new_v4().to_string();
                    let completion =
                        invoke(&task_id, self.config.cycle_budget, &cycle_fn).await;
                    debug!(
                        task_id = %completion.task_id,
                        status = ?completion.status,
                        "Scheduled cycle finished"
                    );
                }
                command = self.commands.recv() => match command {
                    Some(Command::Manual(reply)) => {
                        let task_id = Uuid::new_v4().to_string();
                        let completion =
                            invoke(&task_id, self.config.cycle_budget, &cycle_fn).await;
                        let _ = reply.send(completion);
                    }
                    Some(Command::Shutdown) | None => {
                        info!("Scheduler stopped");
                        break;
                    }
                },
            }
        }
    }
}

/// Run one budgeted cycle for a headless activation.
///
/// The host hands us a task id and a budget; we return the completion it
/// expects. State comes entirely from durable storage, so this works from a
/// fresh process with no UI.
pub async fn run_headless<F, Fut>(
    task_id: &str,
    budget: Duration,
    cycle_fn: F,
) -> TaskCompletion
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<CycleOutcome>>,
{
    invoke(task_id, budget, &cycle_fn).await
}

/// Run `cycle_fn` under the budget and map its outcome to a completion.
/// Every path finishes: success, skip, failure, and budget exhaustion all
/// return a `TaskCompletion`.
async fn invoke<F, Fut>(task_id: &str, budget: Duration, cycle_fn: &F) -> TaskCompletion
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<CycleOutcome>>,
{
    let start = Instant::now();

    let status = match timeout(budget, cycle_fn()).await {
        Ok(Ok(CycleOutcome::Completed(report))) => {
            debug!(
                %task_id,
                submitted = report.events_submitted,
                deferred = report.events_deferred,
                "Cycle completed within budget"
            );
            TaskStatus::Success
        }
        Ok(Ok(CycleOutcome::Skipped)) => {
            debug!(%task_id, "Cycle skipped, another already in flight");
            TaskStatus::Skipped
        }
        Ok(Err(e)) => {
            warn!(%task_id, error = %e, "Cycle failed");
            TaskStatus::Failure
        }
        Err(_) => {
            warn!(
                %task_id,
                budget_secs = budget.as_secs(),
                "Cycle exceeded its execution budget"
            );
            TaskStatus::Failure
        }
    };

    TaskCompletion {
        task_id: task_id.to_string(),
        status,
        duration: start.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CycleReport;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn report() -> CycleReport {
        CycleReport {
            regions_evaluated: 1,
            events_submitted: 0,
            events_deferred: 0,
            failure: None,
            duration: Duration::from_millis(1),
        }
    }

    fn config(min_interval: Duration, cycle_budget: Duration) -> SchedulerConfig {
        SchedulerConfig {
            min_interval,
            cycle_budget,
            ..SchedulerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_manual_trigger_runs_cycle() {
        let counter = Arc::new(AtomicU32::new(0));
        let (scheduler, handle) =
            BackgroundScheduler::new(config(Duration::from_secs(60), Duration::from_secs(1)));

        let c = counter.clone();
        let loop_task = tokio::spawn(handle.run(move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(CycleOutcome::Completed(report()))
            }
        }));

        let completion = scheduler.trigger_manual().await.unwrap();
        assert_eq!(completion.status, TaskStatus::Success);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        scheduler.shutdown().await;
        loop_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_scheduled_ticks_fire_on_interval() {
        let counter = Arc::new(AtomicU32::new(0));
        let (scheduler, handle) = BackgroundScheduler::new(config(
            Duration::from_millis(20),
            Duration::from_secs(1),
        ));

        let c = counter.clone();
        let loop_task = tokio::spawn(handle.run(move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(CycleOutcome::Completed(report()))
            }
        }));

        tokio::time::sleep(Duration::from_millis(90)).await;
        scheduler.shutdown().await;
        loop_task.await.unwrap();

        assert!(counter.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_is_failure() {
        let (scheduler, handle) = BackgroundScheduler::new(config(
            Duration::from_secs(60),
            Duration::from_millis(20),
        ));

        let loop_task = tokio::spawn(handle.run(|| async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(CycleOutcome::Completed(report()))
        }));

        let completion = scheduler.trigger_manual().await.unwrap();
        assert_eq!(completion.status, TaskStatus::Failure);

        scheduler.shutdown().await;
        loop_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_skipped_cycle_completes_as_skipped() {
        let (scheduler, handle) =
            BackgroundScheduler::new(config(Duration::from_secs(60), Duration::from_secs(1)));

        let loop_task =
            tokio::spawn(handle.run(|| async { Ok(CycleOutcome::Skipped) }));

        let completion = scheduler.trigger_manual().await.unwrap();
        assert_eq!(completion.status, TaskStatus::Skipped);

        scheduler.shutdown().await;
        loop_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_cycle_error_is_failure() {
        let (scheduler, handle) =
            BackgroundScheduler::new(config(Duration::from_secs(60), Duration::from_secs(1)));

        let loop_task = tokio::spawn(handle.run(|| async {
            Err(Error::Persistence("disk full".to_string()))
        }));

        let completion = scheduler.trigger_manual().await.unwrap();
        assert_eq!(completion.status, TaskStatus::Failure);

        scheduler.shutdown().await;
        loop_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_trigger_after_shutdown_is_error() {
        let (scheduler, handle) =
            BackgroundScheduler::new(config(Duration::from_secs(60), Duration::from_secs(1)));

        let loop_task =
            tokio::spawn(handle.run(|| async { Ok(CycleOutcome::Completed(report())) }));

        scheduler.shutdown().await;
        loop_task.await.unwrap();

        assert!(scheduler.trigger_manual().await.is_err());
    }

    #[tokio::test]
    async fn test_run_headless_returns_host_task_id() {
        let completion = run_headless("bg-task-7", Duration::from_secs(1), || async {
            Ok(CycleOutcome::Completed(report()))
        })
        .await;

        assert_eq!(completion.task_id, "bg-task-7");
        assert_eq!(completion.status, TaskStatus::Success);
    }

    #[tokio::test]
    async fn test_run_headless_budget_exhaustion() {
        let completion = run_headless("bg-task-8", Duration::from_millis(20), || async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(CycleOutcome::Completed(report()))
        })
        .await;

        assert_eq!(completion.status, TaskStatus::Failure);
    }
}
