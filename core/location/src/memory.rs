//! In-memory location providers for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use fieldmark_common::{Error, LocationFix, Result};

use crate::provider::LocationProvider;

/// Provider that always returns the same fix.
pub struct StaticProvider {
    fix: LocationFix,
}

impl StaticProvider {
    /// Create a provider pinned to one fix.
    pub fn new(fix: LocationFix) -> Self {
        Self { fix }
    }
}

#[async_trait]
impl LocationProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn fix(&self, _timeout: Duration) -> Result<LocationFix> {
        Ok(self.fix.clone())
    }
}

/// Provider that replays a scripted sequence of results.
///
/// Each call pops the next response; an exhausted script yields
/// `ProviderUnavailable`. An optional delay simulates a slow fix source for
/// timeout tests.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<LocationFix>>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    /// Create a provider from a sequence of responses.
    pub fn new(responses: Vec<Result<LocationFix>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            delay: None,
        }
    }

    /// Delay each response by `delay` before returning it.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of responses remaining in the script.
    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl LocationProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fix(&self, timeout: Duration) -> Result<LocationFix> {
        if let Some(delay) = self.delay {
            if delay >= timeout {
                tokio::time::sleep(timeout).await;
                return Err(Error::LocationTimeout(format!(
                    "No fix within {:?}",
                    timeout
                )));
            }
            tokio::time::sleep(delay).await;
        }

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(Error::ProviderUnavailable(
                    "Script exhausted".to_string(),
                ))
            })
    }
}
