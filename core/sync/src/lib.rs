//! FieldMark Attendance Sync Engine
//!
//! This module orchestrates the background attendance cycle:
//! - Persisted, crash-safe sync state with a single writer per cycle
//! - Cross-process single-flight lock covering foreground and headless entry
//!   points
//! - Geofence evaluation and idempotent attendance submission
//! - Retry-as-data: transient failures are re-attempted on the next
//!   scheduled wake, never via in-process timers
//! - Background scheduling under an OS-imposed execution budget

pub mod config;
pub mod engine;
pub mod lock;
pub mod scheduler;
pub mod state;
pub mod store;

// Re-export main types
pub use config::{DataPaths, EngineSettings, SchedulerSettings, SyncConfig};
pub use engine::{CycleOutcome, CycleReport, EngineConfig, SyncEngine};
pub use lock::{CycleGuard, CycleLock};
pub use scheduler::{
    run_headless, BackgroundScheduler, SchedulerConfig, SchedulerHandle, TaskCompletion,
    TaskStatus,
};
pub use state::{FailureReason, RegionSyncEntry, SyncState};
pub use store::{FileStateStore, MemoryStateStore, StateStore};
