//! HTTP attendance reporter.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use fieldmark_common::{Error, Result};

use crate::event::AttendanceEvent;
use crate::reporter::{AttendanceReporter, SubmitOutcome};

/// Opaque credential source for the attendance endpoint.
///
/// Token acquisition (login, refresh) belongs to the host application; the
/// reporter only needs a bearer token per request.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Current bearer token.
    async fn bearer_token(&self) -> Result<String>;
}

/// Credential source backed by a fixed token.
pub struct StaticCredential {
    token: String,
}

impl StaticCredential {
    /// Create a source that always yields `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialSource for StaticCredential {
    async fn bearer_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

/// Wire body for the attendance POST.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitBody<'a> {
    employee_code: &'a str,
    region_id: &'a str,
    timestamp: chrono::DateTime<chrono::Utc>,
    idempotency_key: &'a str,
    coordinate: fieldmark_common::Coordinate,
}

/// Success body: `{"status": "accepted" | "duplicate"}`.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    status: String,
}

/// Reporter that POSTs events to the attendance endpoint.
pub struct HttpReporter {
    http: Client,
    endpoint: Url,
    credentials: Arc<dyn CredentialSource>,
}

impl HttpReporter {
    /// Create a new HTTP reporter.
    ///
    /// The request timeout is baked into the client so a hung backend cannot
    /// outlive the cycle's submission sub-timeout.
    pub fn new(
        endpoint: Url,
        credentials: Arc<dyn CredentialSource>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent("FieldMark/0.1")
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint,
            credentials,
        })
    }
}

#[async_trait]
impl AttendanceReporter for HttpReporter {
    fn name(&self) -> &str {
        "http"
    }

    async fn submit(&self, event: &AttendanceEvent) -> Result<SubmitOutcome> {
        let token = self.credentials.bearer_token().await?;
        let body = SubmitBody {
            employee_code: event.employee_code.as_str(),
            region_id: event.region_id.as_str(),
            timestamp: event.timestamp,
            idempotency_key: &event.idempotency_key,
            coordinate: event.coordinate,
        };

        debug!(key = %event.idempotency_key, endpoint = %self.endpoint, "Submitting attendance event");

        let response = self
            .http
            .post(self.endpoint.clone())
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::TransientNetwork(format!("Failed to reach backend: {}", e)))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        map_response(status, &text)
    }
}

/// Map an HTTP status and body to a submission outcome.
///
/// 2xx parses the `{status}` body; 4xx is a terminal rejection; everything
/// else (5xx and friends) is transient.
fn map_response(status: StatusCode, body: &str) -> Result<SubmitOutcome> {
    if status.is_success() {
        let parsed: SubmitResponse = serde_json::from_str(body).map_err(|e| {
            Error::Serialization(format!("Malformed submission response: {}", e))
        })?;
        match parsed.status.as_str() {
            "accepted" => Ok(SubmitOutcome::Accepted),
            "duplicate" => Ok(SubmitOutcome::Duplicate),
            other => Err(Error::Serialization(format!(
                "Unexpected submission status: {}",
                other
            ))),
        }
    } else if status.is_client_error() {
        Ok(SubmitOutcome::Rejected {
            reason: format!("{}: {}", status, body),
        })
    } else {
        Err(Error::TransientNetwork(format!(
            "Backend error: {} - {}",
            status, body
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fieldmark_common::{Coordinate, EmployeeCode, RegionId};

    #[test]
    fn test_map_accepted() {
        let outcome = map_response(StatusCode::OK, r#"{"status":"accepted"}"#).unwrap();
        assert_eq!(outcome, SubmitOutcome::Accepted);
    }

    #[test]
    fn test_map_duplicate() {
        let outcome = map_response(StatusCode::OK, r#"{"status":"duplicate"}"#).unwrap();
        assert_eq!(outcome, SubmitOutcome::Duplicate);
    }

    #[test]
    fn test_map_client_error_is_rejected() {
        let outcome = map_response(StatusCode::UNPROCESSABLE_ENTITY, "bad region").unwrap();
        assert!(matches!(outcome, SubmitOutcome::Rejected { .. }));
    }

    #[test]
    fn test_map_server_error_is_transient() {
        let err = map_response(StatusCode::BAD_GATEWAY, "upstream down").unwrap_err();
        assert!(matches!(err, Error::TransientNetwork(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_map_malformed_success_body() {
        let err = map_response(StatusCode::OK, "not json").unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_wire_body_is_camel_case() {
        let event = AttendanceEvent::from_fix(
            EmployeeCode::new("EMP-042").unwrap(),
            RegionId::new("hq").unwrap(),
            &fieldmark_common::LocationFix::new(
                Coordinate::new(13.7563, 100.5018).unwrap(),
                8.0,
                Utc.with_ymd_and_hms(2026, 8, 24, 9, 0, 0).unwrap(),
            ),
        );
        let body = SubmitBody {
            employee_code: event.employee_code.as_str(),
            region_id: event.region_id.as_str(),
            timestamp: event.timestamp,
            idempotency_key: &event.idempotency_key,
            coordinate: event.coordinate,
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["employeeCode"], "EMP-042");
        assert_eq!(value["regionId"], "hq");
        assert_eq!(value["idempotencyKey"], "EMP-042:hq:2026-08-24");
        assert!(value["coordinate"]["latitude"].is_f64());
    }
}
