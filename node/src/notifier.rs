//! Notifier interface and the HTTP webhook implementation.
//!
//! The concrete transport behind the webhook (email, chat, queue) is
//! someone else's problem; the pipeline only needs accepted/transient/
//! permanent outcomes and an opaque message id.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Deadline for one notifier send.
const SEND_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("transient notifier failure: {0}")]
    Transient(String),

    #[error("permanent notifier failure: {0}")]
    Permanent(String),
}

/// Successful dispatch receipt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Accepted {
    pub message_id: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        address: &str,
        subject: &str,
        body: &str,
    ) -> Result<Accepted, NotifyError>;
}

#[derive(Debug, Deserialize)]
struct WebhookReceipt {
    #[serde(default)]
    message_id: Option<String>,
}

/// POSTs `{address, subject, body}` as JSON to a configured URL.
pub struct WebhookNotifier {
    url: String,
    http: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::Permanent(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { url, http })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(
        &self,
        address: &str,
        subject: &str,
        body: &str,
    ) -> Result<Accepted, NotifyError> {
        let payload = json!({
            "address": address,
            "subject": subject,
            "body": body,
        });

        let response = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotifyError::Transient("send timed out".to_string())
                } else {
                    NotifyError::Transient(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            let receipt: WebhookReceipt = response.json().await.unwrap_or(WebhookReceipt {
                message_id: None,
            });
            Ok(Accepted {
                message_id: receipt
                    .message_id
                    .unwrap_or_else(|| "accepted".to_string()),
            })
        } else if status.as_u16() == 429 || status.is_server_error() {
            Err(NotifyError::Transient(format!("HTTP {}", status.as_u16())))
        } else {
            Err(NotifyError::Permanent(format!("HTTP {}", status.as_u16())))
        }
    }
}
