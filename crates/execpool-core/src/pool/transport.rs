// src/pool/transport.rs
use async_trait::async_trait;
use std::time::Duration;

use crate::config::{PoolConfig, INDEX_PLACEHOLDER};
use crate::core_types::{
    AttemptOutcome, ExecutionRequest, HealthResponse, NodeExecuteResponse, NodeReply,
};
use crate::errors::TransportError;

/// Deterministic node naming: node `n` lives at the template with `{index}` = `n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAddressing {
    template: String,
}

impl NodeAddressing {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn url_for(&self, index: usize) -> String {
        self.template
            .replace(INDEX_PLACEHOLDER, &index.to_string())
            .trim_end_matches('/')
            .to_string()
    }
}

/// Sends one attempt to one node.
///
/// Implementations classify every infrastructure problem as
/// `AttemptOutcome::Transport`; any structurally valid reply is `Completed`,
/// whatever the executed program did.
#[async_trait]
pub trait NodeTransport: Send + Sync {
    async fn send(&self, index: usize, request: &ExecutionRequest) -> AttemptOutcome;
}

pub struct HttpNodeTransport {
    client: reqwest::Client,
    addressing: NodeAddressing,
    grace: Duration,
}

impl HttpNodeTransport {
    pub fn new(addressing: NodeAddressing) -> Self {
        Self {
            client: reqwest::Client::new(),
            addressing,
            grace: Duration::from_secs(5),
        }
    }

    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(NodeAddressing::new(config.node_url_template.clone()))
            .with_grace(Duration::from_secs(config.request_grace_secs))
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn addressing(&self) -> &NodeAddressing {
        &self.addressing
    }

    pub async fn health(&self, index: usize) -> Result<HealthResponse, TransportError> {
        let url = format!("{}/health", self.addressing.url_for(index));
        let response = self
            .client
            .get(&url)
            .timeout(self.grace)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<HealthResponse>()
            .await
            .map_err(|e| TransportError::from_reqwest(&url, e))
    }
}

#[async_trait]
impl NodeTransport for HttpNodeTransport {
    async fn send(&self, index: usize, request: &ExecutionRequest) -> AttemptOutcome {
        let url = format!("{}/execute", self.addressing.url_for(index));
        log::info!(
            "Executing code in executor-{} with ID {}",
            index,
            request.execution_id
        );

        // Caller-side limit only; the node enforces its own timeout.
        let timeout = Duration::from_secs(request.timeout_seconds).saturating_add(self.grace);
        let response = match self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&request.to_wire())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return AttemptOutcome::Transport(TransportError::from_reqwest(&url, e)),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("Error from executor-{}: HTTP {} {}", index, status, body);
            return AttemptOutcome::Transport(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        match response.json::<NodeExecuteResponse>().await {
            Ok(body) => AttemptOutcome::Completed(NodeReply {
                status_code: status.as_u16(),
                result: body.into_result(request.execution_id),
            }),
            Err(e) if e.is_decode() => {
                AttemptOutcome::Transport(TransportError::MalformedBody(e.to_string()))
            }
            Err(e) => AttemptOutcome::Transport(TransportError::from_reqwest(&url, e)),
        }
    }
}
