//! Location acquisition for FieldMark.
//!
//! Defines the [`LocationProvider`] port the sync engine consumes, plus a
//! file-backed provider fed by the platform location service and in-memory
//! providers for tests.

pub mod file;
pub mod memory;
pub mod provider;

pub use file::FileFixProvider;
pub use memory::{ScriptedProvider, StaticProvider};
pub use provider::LocationProvider;
