//! Location provider trait definition.

use async_trait::async_trait;
use std::time::Duration;

use fieldmark_common::{LocationFix, Result};

/// Source of device location fixes.
///
/// Implementations must respect the caller-supplied timeout and never block
/// indefinitely: a background cycle runs under an OS-imposed execution
/// budget.
///
/// # Errors
/// - `PermissionDenied` — terminal for the cycle; the engine skips without
///   consuming retry budget
/// - `LocationTimeout` — no fix within `timeout`; retried on the next wake
/// - `ProviderUnavailable` — no fix source available; retried on the next wake
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Get the provider name (e.g., "file", "static").
    fn name(&self) -> &str;

    /// Obtain the current fix, waiting at most `timeout`.
    async fn fix(&self, timeout: Duration) -> Result<LocationFix>;
}
