use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use super::result::FetchFailure;
use super::task::{FetchTask, HttpMethod};
use crate::config::FetchSettings;

const BODY_EXCERPT_LIMIT: usize = 256;

/// Performs the single HTTP exchange behind a task.
///
/// Implementations are shared by every worker in a batch, so they must be safe for
/// concurrent use. Errors are per-task values and never abort the batch.
pub trait FetchTransport: Send + Sync + 'static {
    fn execute(
        &self,
        task: &FetchTask,
    ) -> impl Future<Output = Result<Value, FetchFailure>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportBuildError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Transport backed by one pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn from_settings(settings: &FetchSettings) -> Result<Self, TransportBuildError> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .connect_timeout(Duration::from_millis(settings.request_timeout_ms))
            .build()?;
        Ok(Self::from_client(client))
    }
}

impl FetchTransport for ReqwestTransport {
    async fn execute(&self, task: &FetchTask) -> Result<Value, FetchFailure> {
        let mut request = match task.method() {
            HttpMethod::Get => self.client.get(task.endpoint()),
            HttpMethod::Post => self.client.post(task.endpoint()),
        };
        if !task.query().is_empty() {
            request = request.query(task.query());
        }
        if let Some(body) = task.body() {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| FetchFailure::request(err.to_string()))?;

        let status = response.status();
        debug!(task_id = %task.id(), status = status.as_u16(), "upstream responded");

        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(err) => {
                    debug!(task_id = %task.id(), error = %err, "could not read error body");
                    String::new()
                }
            };
            let message = if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("non-success status")
                    .to_string()
            } else {
                excerpt(body.trim())
            };
            return Err(FetchFailure::bad_status(status.as_u16(), message));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| FetchFailure::request(format!("failed to read body: {err}")))?;

        serde_json::from_slice(&bytes)
            .map_err(|err| FetchFailure::malformed(format!("payload is not valid JSON: {err}")))
    }
}

fn excerpt(body: &str) -> String {
    if body.chars().count() <= BODY_EXCERPT_LIMIT {
        return body.to_string();
    }
    let mut cut: String = body.chars().take(BODY_EXCERPT_LIMIT - 1).collect();
    cut.push('…');
    cut
}
