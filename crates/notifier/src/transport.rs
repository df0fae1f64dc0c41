//! Single-device push transport.
//!
//! `FcmTransport` talks to the Firebase Cloud Messaging HTTP v1 API:
//! `POST {endpoint}/v1/projects/{project}/messages:send`. A message rejected
//! with the FCM error code `UNREGISTERED` means the token will never work
//! again; every other failure is treated as transient.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use rally_common::config::AppConfig;
use rally_common::types::NotificationPayload;

/// FCM error code for a token that is no longer valid.
const UNREGISTERED_CODE: &str = "UNREGISTERED";

#[derive(Debug, Error)]
pub enum PushError {
    /// The provider says the token is permanently invalid.
    #[error("device token is not registered")]
    Unregistered,

    #[error("push provider rejected the message ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("push request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("push transport is not configured")]
    NotConfigured,
}

impl PushError {
    pub fn is_unregistered(&self) -> bool {
        matches!(self, PushError::Unregistered)
    }
}

/// Sends one notification to one device token.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Returns the provider's message id on success.
    async fn send(&self, token: &str, payload: &NotificationPayload) -> Result<String, PushError>;
}

#[derive(Debug, Clone)]
struct FcmCredentials {
    project_id: String,
    access_token: String,
}

/// Firebase Cloud Messaging HTTP v1 transport.
#[derive(Clone)]
pub struct FcmTransport {
    http: reqwest::Client,
    endpoint: String,
    credentials: Option<FcmCredentials>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
}

impl FcmTransport {
    pub fn new(
        http: reqwest::Client,
        endpoint: &str,
        project_id: Option<String>,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Self {
        let credentials = match (project_id, access_token) {
            (Some(project_id), Some(access_token))
                if !project_id.is_empty() && !access_token.is_empty() =>
            {
                Some(FcmCredentials {
                    project_id,
                    access_token,
                })
            }
            _ => None,
        };

        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            credentials,
            timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let transport = Self::new(
            reqwest::Client::new(),
            &config.fcm_endpoint,
            config.fcm_project_id.clone(),
            config.fcm_access_token.clone(),
            config.push_timeout(),
        );

        if !transport.is_configured() {
            tracing::warn!(
                "FCM_PROJECT_ID or FCM_ACCESS_TOKEN not set, push notifications will not be delivered"
            );
        }

        transport
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    fn send_url(&self, project_id: &str) -> String {
        format!("{}/v1/projects/{}/messages:send", self.endpoint, project_id)
    }

    /// Build the FCM v1 `messages:send` request body.
    pub fn request_body(token: &str, payload: &NotificationPayload) -> serde_json::Value {
        json!({
            "message": {
                "token": token,
                "notification": {
                    "title": payload.title,
                    "body": payload.body,
                },
                "data": payload.data,
            }
        })
    }
}

#[async_trait]
impl PushTransport for FcmTransport {
    async fn send(&self, token: &str, payload: &NotificationPayload) -> Result<String, PushError> {
        let credentials = self.credentials.as_ref().ok_or(PushError::NotConfigured)?;

        let response = self
            .http
            .post(self.send_url(&credentials.project_id))
            .bearer_auth(&credentials.access_token)
            .timeout(self.timeout)
            .json(&Self::request_body(token, payload))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let reply: SendResponse = response.json().await?;
            return Ok(reply.name);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status, &body))
    }
}

/// Map a non-success FCM response onto a `PushError`.
pub fn classify_failure(status: StatusCode, body: &str) -> PushError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let unregistered = envelope
                .error
                .details
                .iter()
                .any(|d| d.error_code.as_deref() == Some(UNREGISTERED_CODE));

            if unregistered {
                PushError::Unregistered
            } else {
                PushError::Rejected {
                    status: status.as_u16(),
                    detail: envelope.error.message,
                }
            }
        }
        Err(_) => PushError::Rejected {
            status: status.as_u16(),
            detail: body.chars().take(200).collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn payload() -> NotificationPayload {
        let mut data = BTreeMap::new();
        data.insert("type".to_string(), "daily_reminder".to_string());
        NotificationPayload {
            title: "☀️ Good Morning!".to_string(),
            body: "Have a great day!".to_string(),
            data,
        }
    }

    #[test]
    fn test_unregistered_error_code_is_permanent() {
        let body = r#"{
            "error": {
                "code": 404,
                "message": "Requested entity was not found.",
                "status": "NOT_FOUND",
                "details": [{
                    "@type": "type.googleapis.com/google.firebase.fcm.v1.FcmError",
                    "errorCode": "UNREGISTERED"
                }]
            }
        }"#;
        let err = classify_failure(StatusCode::NOT_FOUND, body);
        assert!(err.is_unregistered());
    }

    #[test]
    fn test_quota_error_is_transient() {
        let body = r#"{
            "error": {
                "code": 429,
                "message": "Quota exceeded",
                "details": [{"errorCode": "QUOTA_EXCEEDED"}]
            }
        }"#;
        let err = classify_failure(StatusCode::TOO_MANY_REQUESTS, body);
        assert!(!err.is_unregistered());
        match err {
            PushError::Rejected { status, detail } => {
                assert_eq!(status, 429);
                assert_eq!(detail, "Quota exceeded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_json_body_is_transient() {
        let err = classify_failure(StatusCode::BAD_GATEWAY, "<html>upstream down</html>");
        assert!(matches!(err, PushError::Rejected { status: 502, .. }));
    }

    #[test]
    fn test_request_body_shape() {
        let body = FcmTransport::request_body("device-token", &payload());
        assert_eq!(body["message"]["token"], "device-token");
        assert_eq!(body["message"]["notification"]["title"], "☀️ Good Morning!");
        assert_eq!(body["message"]["data"]["type"], "daily_reminder");
    }

    #[test]
    fn test_missing_credentials_disable_transport() {
        let transport = FcmTransport::new(
            reqwest::Client::new(),
            "https://fcm.googleapis.com/",
            Some("rally-prod".to_string()),
            None,
            Duration::from_secs(10),
        );
        assert!(!transport.is_configured());
    }

    #[tokio::test]
    async fn test_unconfigured_transport_refuses_to_send() {
        let transport = FcmTransport::new(
            reqwest::Client::new(),
            "https://fcm.googleapis.com",
            None,
            None,
            Duration::from_secs(10),
        );
        let err = transport.send("device-token", &payload()).await.unwrap_err();
        assert!(matches!(err, PushError::NotConfigured));
    }

    #[test]
    fn test_send_url_trims_trailing_slash() {
        let transport = FcmTransport::new(
            reqwest::Client::new(),
            "https://fcm.googleapis.com/",
            Some("rally-prod".to_string()),
            Some("ya29.token".to_string()),
            Duration::from_secs(10),
        );
        assert!(transport.is_configured());
        assert_eq!(
            transport.send_url("rally-prod"),
            "https://fcm.googleapis.com/v1/projects/rally-prod/messages:send"
        );
    }
}
