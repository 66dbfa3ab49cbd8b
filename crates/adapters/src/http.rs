//! HTTP-backed collaborators: a CDN purge endpoint and a transactional
//! email API used for change notifications and failure alerts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use tracing::{info, instrument};

use crate::{AdapterError, CacheInvalidator, Notifier};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Map a non-success status to an adapter error: throttling and server
/// errors may clear up, anything else is a contract problem.
async fn error_for_response(service: &str, response: reqwest::Response) -> AdapterError {
    let status = response.status();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "(no body)".to_string());
    let msg = format!("{service} error: {status} - {text}");
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        AdapterError::Retryable(msg)
    } else {
        AdapterError::Fatal(msg)
    }
}

fn build_client() -> Result<reqwest::Client, AdapterError> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .map_err(|e| AdapterError::fatal(format!("cannot build HTTP client: {e}")))
}

// ---------------------------------------------------------------------------
// CDN purge
// ---------------------------------------------------------------------------

/// POSTs `{"paths": [...], "callerReference": "..."}` to a purge endpoint.
pub struct HttpInvalidator {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpInvalidator {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Result<Self, AdapterError> {
        Ok(Self {
            client: build_client()?,
            endpoint: endpoint.into(),
            token,
        })
    }
}

#[async_trait]
impl CacheInvalidator for HttpInvalidator {
    #[instrument(skip(self, paths), fields(endpoint = %self.endpoint))]
    async fn invalidate(&self, paths: &[String], caller_reference: &str) -> Result<(), AdapterError> {
        let body = json!({
            "paths": paths,
            "callerReference": caller_reference,
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(error_for_response("CDN purge", response).await);
        }

        info!("invalidated {} path(s)", paths.len());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Email
// ---------------------------------------------------------------------------

/// Settings for the transactional email API.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub sender_email: String,
    pub sender_name: String,
    pub recipient: String,
}

/// Sends each published message as a plain-text email.
pub struct EmailNotifier {
    client: reqwest::Client,
    config: EmailConfig,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Result<Self, AdapterError> {
        Ok(Self {
            client: build_client()?,
            config,
        })
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    #[instrument(skip(self, message))]
    async fn publish(&self, subject: &str, message: &str) -> Result<(), AdapterError> {
        let body = json!({
            "sender": {
                "name": self.config.sender_name,
                "email": self.config.sender_email
            },
            "to": [
                {
                    "email": self.config.recipient
                }
            ],
            "subject": subject,
            "textContent": message
        });

        let response = self
            .client
            .post(&self.config.api_url)
            .header("api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_response("email API", response).await);
        }

        info!("sent notification to {}", self.config.recipient);
        Ok(())
    }
}
