//! What a schedule tick invokes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, instrument};

use engine::{Reconciler, TriggerPayload, WorkflowInput};

use crate::InvocationError;

/// Outcome of a run that was successfully started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunResult {
    Succeeded,
    Failed(String),
}

/// Something that can start a reconciliation run from a trigger payload.
#[async_trait]
pub trait RunTarget: Send + Sync {
    async fn invoke(&self, payload: &TriggerPayload) -> Result<RunResult, InvocationError>;
}

// ---------------------------------------------------------------------------
// In-process
// ---------------------------------------------------------------------------

/// Runs the reconciler in the scheduler's own process.
pub struct LocalTarget {
    reconciler: Arc<Reconciler>,
}

impl LocalTarget {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self { reconciler }
    }
}

#[async_trait]
impl RunTarget for LocalTarget {
    async fn invoke(&self, payload: &TriggerPayload) -> Result<RunResult, InvocationError> {
        let input = WorkflowInput::try_from(payload.clone())
            .map_err(|e| InvocationError::Rejected(e.to_string()))?;

        Ok(match self.reconciler.run(&input).await {
            Ok(report) => {
                debug!("run {} finished (changed: {})", report.run_id, report.changed);
                RunResult::Succeeded
            }
            Err(err) => RunResult::Failed(err.to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Remote
// ---------------------------------------------------------------------------

/// POSTs the payload to a `weather-site serve` instance.
pub struct HttpTarget {
    client: reqwest::Client,
    url: String,
}

impl HttpTarget {
    /// `base_url` is the server root, e.g. `http://localhost:8080`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, InvocationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InvocationError::Rejected(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: format!("{}/api/v1/runs", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl RunTarget for HttpTarget {
    /// A timeout is reported as transient even when the server already
    /// started the run, so the scheduler may deliver the same tick twice.
    /// Delivery is at-least-once; a repeated run with the same weather
    /// finds the status unchanged and ends in UpToDate.
    #[instrument(skip(self, payload), fields(url = %self.url))]
    async fn invoke(&self, payload: &TriggerPayload) -> Result<RunResult, InvocationError> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| InvocationError::Transient(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        match status {
            s if s.is_success() => Ok(RunResult::Succeeded),
            // The server started the run and it ended in failure.
            StatusCode::INTERNAL_SERVER_ERROR => Ok(RunResult::Failed(body)),
            StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => {
                Err(InvocationError::Transient(format!("{status}: {body}")))
            }
            _ => Err(InvocationError::Rejected(format!("{status}: {body}"))),
        }
    }
}
