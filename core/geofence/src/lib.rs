//! FieldMark geofence evaluation.
//!
//! This module classifies a device location fix against configured circular
//! regions, with hysteresis to prevent inside/outside flapping near the
//! boundary when GPS accuracy is poor.

pub mod evaluator;
pub mod region;

pub use evaluator::{EvaluatorConfig, GeofenceEvaluator, GeofenceStatus, RegionStatus};
pub use region::GeofenceRegion;
