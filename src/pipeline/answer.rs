//! The downstream answer collaborator.
//!
//! Retrieval and generation live in another service; the gateway only needs
//! `answer(tenant, query) -> (text, sources)`.

use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AnswerConfig;

/// A computed answer, as cached and returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryAnswer {
    pub text: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Errors from the answer collaborator.
#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("answer service unreachable: {0}")]
    Transport(String),

    #[error("answer service timed out after {0} seconds")]
    Timeout(u64),

    #[error("answer service returned status {0}")]
    Status(u16),

    #[error("invalid answer payload: {0}")]
    Decode(String),
}

impl AnswerError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AnswerError::Transport(_) => "transport",
            AnswerError::Timeout(_) => "timeout",
            AnswerError::Status(_) => "status",
            AnswerError::Decode(_) => "decode",
        }
    }
}

/// Computes answers for a tenant. Implementations must be safe to call
/// concurrently for different tenants.
pub trait AnswerService: Send + Sync {
    fn answer<'a>(
        &'a self,
        tenant_id: &'a str,
        query: &'a str,
    ) -> BoxFuture<'a, Result<QueryAnswer, AnswerError>>;
}

#[derive(Serialize)]
struct AnswerRequest<'a> {
    tenant_id: &'a str,
    query: &'a str,
}

/// Calls a remote answer service over HTTP.
pub struct UpstreamAnswerService {
    client: reqwest::Client,
    url: String,
    timeout_secs: u64,
}

impl UpstreamAnswerService {
    pub fn new(config: &AnswerConfig) -> Result<Self, AnswerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AnswerError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: config.upstream_url.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn classify(&self, e: reqwest::Error) -> AnswerError {
        if e.is_timeout() {
            AnswerError::Timeout(self.timeout_secs)
        } else if e.is_decode() {
            AnswerError::Decode(e.to_string())
        } else {
            AnswerError::Transport(e.to_string())
        }
    }
}

impl AnswerService for UpstreamAnswerService {
    fn answer<'a>(
        &'a self,
        tenant_id: &'a str,
        query: &'a str,
    ) -> BoxFuture<'a, Result<QueryAnswer, AnswerError>> {
        async move {
            let response = self
                .client
                .post(&self.url)
                .json(&AnswerRequest { tenant_id, query })
                .send()
                .await
                .map_err(|e| self.classify(e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(AnswerError::Status(status.as_u16()));
            }

            response
                .json::<QueryAnswer>()
                .await
                .map_err(|e| AnswerError::Decode(e.to_string()))
        }
        .boxed()
    }
}
