//! Common utilities and types shared across FieldMark modules.
//!
//! This module provides foundational types that are used throughout the
//! attendance sync engine, ensuring consistency and type safety.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Coordinate, EmployeeCode, LocationFix, RegionId};
