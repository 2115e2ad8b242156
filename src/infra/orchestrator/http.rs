//! HTTP client for the external long-running orchestrator.
//!
//! Expects `GET {base_url}/threads/{thread_id}/status` to return
//! `{"status": "...", "summary"?, "error"?, "interrupt_action"?, "interrupt_description"?}`.

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

use crate::config::OrchestratorConfig;
use crate::core::{OrchestratorClient, OrchestratorStatus, SchedulerError};

/// Wire shape of a status response.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    /// `running`, `interrupted`, `done` or `error`.
    pub status: String,
    /// Final summary when done.
    #[serde(default)]
    pub summary: Option<String>,
    /// Failure detail when errored.
    #[serde(default)]
    pub error: Option<String>,
    /// Action tag when interrupted.
    #[serde(default)]
    pub interrupt_action: Option<String>,
    /// Question or action description when interrupted.
    #[serde(default)]
    pub interrupt_description: Option<String>,
}

impl TryFrom<StatusResponse> for OrchestratorStatus {
    type Error = SchedulerError;

    fn try_from(resp: StatusResponse) -> Result<Self, SchedulerError> {
        match resp.status.to_ascii_lowercase().as_str() {
            "running" | "pending" => Ok(Self::Running),
            "interrupted" => Ok(Self::Interrupted {
                action: resp.interrupt_action,
                description: resp.interrupt_description,
            }),
            "done" | "completed" => Ok(Self::Done {
                summary: resp.summary,
            }),
            "error" | "failed" => Ok(Self::Error { error: resp.error }),
            other => Err(SchedulerError::Orchestrator(format!(
                "unknown orchestrator status `{other}`"
            ))),
        }
    }
}

/// `reqwest`-based orchestrator client.
#[derive(Debug, Clone)]
pub struct HttpOrchestratorClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpOrchestratorClient {
    /// Build a client from validated configuration.
    pub fn new(config: &OrchestratorConfig) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::Config)?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        let base_url = Url::parse(&config.base_url)
            .map_err(|err| SchedulerError::Config(format!("orchestrator base_url: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(SchedulerError::Config(format!(
                "orchestrator base_url cannot carry a path: {base_url}"
            )));
        }
        Ok(Self { client, base_url })
    }

    /// `{base}/threads/{thread_id}/status`, with `thread_id` encoded as one segment.
    fn status_url(&self, thread_id: &str) -> Result<Url, SchedulerError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                SchedulerError::Config(format!("orchestrator base_url: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(["threads", thread_id, "status"]);
        Ok(url)
    }
}

#[async_trait]
impl OrchestratorClient for HttpOrchestratorClient {
    async fn status(&self, thread_id: &str) -> Result<OrchestratorStatus, SchedulerError> {
        let resp = self
            .client
            .get(self.status_url(thread_id)?)
            .send()
            .await?
            .error_for_status()?;
        let body: StatusResponse = resp.json().await?;
        OrchestratorStatus::try_from(body)
    }
}
