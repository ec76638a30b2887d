//! File-backed location provider.
//!
//! The platform shell (the mobile host's location service) maintains a small
//! JSON drop-file with the most recent fix, or a denial marker when the user
//! has revoked location permission. Reading it is the headless-safe way to
//! obtain a position without holding our own GPS session.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::debug;

use fieldmark_common::{Error, LocationFix, Result};

use crate::provider::LocationProvider;

/// On-disk document written by the platform location service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixDocument {
    /// Set when the user has revoked location permission.
    #[serde(default)]
    pub denied: bool,
    /// The most recent fix, absent while the service is warming up.
    #[serde(default)]
    pub fix: Option<LocationFix>,
}

/// Provider that reads the platform's fix drop-file.
pub struct FileFixProvider {
    path: PathBuf,
    /// Fixes older than this are treated as unavailable, not as current.
    max_age: chrono::Duration,
}

impl FileFixProvider {
    /// Create a provider reading from `path`, rejecting fixes older than
    /// `max_age_secs`.
    pub fn new(path: impl AsRef<Path>, max_age_secs: i64) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_age: chrono::Duration::seconds(max_age_secs),
        }
    }

    async fn read_document(&self) -> Result<FixDocument> {
        let content = fs::read_to_string(&self.path).await.map_err(|e| {
            Error::ProviderUnavailable(format!(
                "Cannot read fix file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            Error::ProviderUnavailable(format!(
                "Malformed fix file {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

#[async_trait]
impl LocationProvider for FileFixProvider {
    fn name(&self) -> &str {
        "file"
    }

    async fn fix(&self, timeout: Duration) -> Result<LocationFix> {
        let document = tokio::time::timeout(timeout, self.read_document())
            .await
            .map_err(|_| {
                Error::LocationTimeout(format!("No fix within {:?}", timeout))
            })??;

        if document.denied {
            return Err(Error::PermissionDenied(
                "Platform reports location permission revoked".to_string(),
            ));
        }

        let fix = document.fix.ok_or_else(|| {
            Error::ProviderUnavailable("Fix file contains no fix yet".to_string())
        })?;

        let age = fix.age(Utc::now());
        if age > self.max_age {
            return Err(Error::ProviderUnavailable(format!(
                "Last fix is {}s old, max age is {}s",
                age.num_seconds(),
                self.max_age.num_seconds()
            )));
        }

        debug!(
            coordinate = %fix.coordinate,
            accuracy_m = fix.accuracy_m,
            age_secs = age.num_seconds(),
            "Read fix from drop-file"
        );

        Ok(fix)
    }
}
