//! On-disk configuration for the sync engine and scheduler.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use fieldmark_common::{EmployeeCode, Error, Result};
use fieldmark_geofence::{EvaluatorConfig, GeofenceRegion};

use crate::engine::EngineConfig;
use crate::scheduler::SchedulerConfig;

/// Engine tuning knobs as they appear in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Consecutive transient failures before an event is dropped.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Sub-timeout for obtaining a location fix.
    #[serde(default = "default_location_timeout_secs")]
    pub location_timeout_secs: u64,
    /// Sub-timeout for one backend submission.
    #[serde(default = "default_submit_timeout_secs")]
    pub submit_timeout_secs: u64,
    /// Fixes older than this are treated as unavailable.
    #[serde(default = "default_fix_max_age_secs")]
    pub fix_max_age_secs: u64,
}

fn default_max_retries() -> u32 {
    5
}
fn default_location_timeout_secs() -> u64 {
    10
}
fn default_submit_timeout_secs() -> u64 {
    10
}
fn default_fix_max_age_secs() -> u64 {
    300
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            location_timeout_secs: default_location_timeout_secs(),
            submit_timeout_secs: default_submit_timeout_secs(),
            fix_max_age_secs: default_fix_max_age_secs(),
        }
    }
}

impl EngineSettings {
    /// Convert to the engine's runtime configuration.
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_retries: self.max_retries,
            location_timeout: Duration::from_secs(self.location_timeout_secs),
            submit_timeout: Duration::from_secs(self.submit_timeout_secs),
        }
    }
}

/// Scheduling contract as it appears in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default = "default_min_interval_minutes")]
    pub min_interval_minutes: u64,
    #[serde(default = "default_true")]
    pub requires_network: bool,
    #[serde(default = "default_true")]
    pub run_in_background: bool,
    #[serde(default = "default_cycle_budget_secs")]
    pub cycle_budget_secs: u64,
}

fn default_min_interval_minutes() -> u64 {
    15
}
fn default_true() -> bool {
    true
}
fn default_cycle_budget_secs() -> u64 {
    30
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            min_interval_minutes: default_min_interval_minutes(),
            requires_network: true,
            run_in_background: true,
            cycle_budget_secs: default_cycle_budget_secs(),
        }
    }
}

impl SchedulerSettings {
    /// Convert to the scheduler's runtime configuration.
    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            min_interval: Duration::from_secs(self.min_interval_minutes * 60),
            requires_network: self.requires_network,
            run_in_background: self.run_in_background,
            cycle_budget: Duration::from_secs(self.cycle_budget_secs),
        }
    }
}

/// Where durable files live.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataPaths {
    /// Override for the data directory. Defaults to the platform-local app
    /// data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl DataPaths {
    /// Resolve the data directory.
    pub fn base_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("fieldmark")
        })
    }

    /// Path of the durable sync state record.
    pub fn state_path(&self) -> PathBuf {
        self.base_dir().join("sync_state.json")
    }

    /// Path of the single-flight cycle lock.
    pub fn lock_path(&self) -> PathBuf {
        self.base_dir().join("cycle.lock")
    }

    /// Path the platform location shim writes the latest fix to.
    pub fn fix_path(&self) -> PathBuf {
        self.base_dir().join("last_fix.json")
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Employee this device reports attendance for.
    pub employee_code: String,
    /// Attendance submission endpoint.
    pub attendance_endpoint: String,
    /// Bearer token presented to the backend.
    pub auth_token: String,
    /// Assigned geofence regions.
    pub regions: Vec<GeofenceRegion>,
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub paths: DataPaths,
}

impl SyncConfig {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    /// - `Config` — the file is missing, malformed, or fails validation
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!("Malformed config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        debug!(path = %path.display(), regions = config.regions.len(), "Loaded config");
        Ok(config)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        EmployeeCode::new(&self.employee_code)
            .map_err(|e| Error::Config(format!("Invalid employee_code: {}", e)))?;
        if self.attendance_endpoint.trim().is_empty() {
            return Err(Error::Config(
                "attendance_endpoint must not be empty".to_string(),
            ));
        }
        if self.regions.is_empty() {
            return Err(Error::Config(
                "At least one geofence region is required".to_string(),
            ));
        }
        Ok(())
    }

    /// The validated employee code.
    pub fn employee_code(&self) -> Result<EmployeeCode> {
        EmployeeCode::new(&self.employee_code)
    }
}
