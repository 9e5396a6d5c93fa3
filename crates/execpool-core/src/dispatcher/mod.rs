//! Pool dispatcher: routes an execution to the executor pool and falls back to
//! the local sandbox.
//!
//! Each attempt picks a node at random (with replacement) and sends the same
//! `ExecutionRequest`. Only transport failures are retried, with a fixed
//! backoff between attempts. A structurally valid reply ends the dispatch even
//! when the program failed, so genuine error output is never hidden behind
//! retries. Once every attempt has failed at the transport level the local
//! sandbox runs exactly once and its answer is final. The caller always gets a
//! string back.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::audit::AuditLogStore;
use crate::config::{ExecPoolConfig, ExecutionConfig};
use crate::core_types::{AttemptOutcome, ExecutionRequest, ExecutionResult};
use crate::errors::TransportError;
use crate::executors::{LocalExecutor, LocalSandbox};
use crate::pool::{HttpNodeTransport, NodeSelector, NodeTransport, RandomSelector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self {
            max_attempts: config.max_attempts(),
            backoff: config.backoff(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ExecutionConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServedBy {
    Node { index: usize },
    LocalSandbox,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub node_index: usize,
    pub error: Option<TransportError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub execution_id: Uuid,
    pub output: String,
    pub served_by: ServedBy,
    pub attempts: Vec<AttemptRecord>,
}

pub struct Dispatcher {
    config: Arc<ExecPoolConfig>,
    policy: RetryPolicy,
    transport: Arc<dyn NodeTransport>,
    selector: Arc<dyn NodeSelector>,
    fallback: Arc<dyn LocalExecutor>,
    audit: Option<AuditLogStore>,
}

impl Dispatcher {
    /// Wires the production collaborators from `config`. No audit log is
    /// attached until `with_audit_log` is called.
    pub fn new(config: Arc<ExecPoolConfig>) -> Self {
        let transport = HttpNodeTransport::from_config(&config.pool);
        let fallback = LocalSandbox::new(config.sandbox.clone(), &config.pool.allowed_modules);
        Self {
            policy: RetryPolicy::from_config(&config.execution),
            transport: Arc::new(transport),
            selector: Arc::new(RandomSelector::from_entropy()),
            fallback: Arc::new(fallback),
            audit: None,
            config,
        }
    }

    pub fn with_audit_log(mut self, audit: AuditLogStore) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn NodeTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_selector(mut self, selector: Arc<dyn NodeSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn LocalExecutor>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &ExecPoolConfig {
        &self.config
    }

    /// Runs `code` and returns the caller-facing output. Never fails.
    pub async fn execute(&self, code: &str, timeout: Option<u64>) -> String {
        let timeout = timeout.unwrap_or(self.config.execution.default_timeout_secs);
        self.dispatch(ExecutionRequest::new(code, timeout)).await.output
    }

    pub async fn dispatch(&self, request: ExecutionRequest) -> DispatchReport {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempts = Vec::with_capacity(max_attempts as usize);

        for attempt in 1..=max_attempts {
            let index = self.selector.pick(self.config.pool.pool_size);

            match self.transport.send(index, &request).await {
                AttemptOutcome::Completed(reply) => {
                    attempts.push(AttemptRecord {
                        attempt,
                        node_index: index,
                        error: None,
                    });
                    log::debug!(
                        "Execution {} completed on executor-{} with return code {}",
                        request.execution_id,
                        index,
                        reply.result.return_code
                    );
                    self.record(&request, &reply.result, Some(i32::from(reply.status_code)))
                        .await;

                    return DispatchReport {
                        execution_id: request.execution_id,
                        output: reply.result.render_output(),
                        served_by: ServedBy::Node { index },
                        attempts,
                    };
                }
                AttemptOutcome::Transport(err) => {
                    log::warn!(
                        "Attempt {} of {} on executor-{} failed: {}",
                        attempt,
                        max_attempts,
                        index,
                        err
                    );
                    attempts.push(AttemptRecord {
                        attempt,
                        node_index: index,
                        error: Some(err),
                    });
                    if attempt < max_attempts {
                        tokio::time::sleep(self.policy.backoff).await;
                    }
                }
            }
        }

        log::error!(
            "All {} attempts failed for execution {}. Falling back to local execution.",
            max_attempts,
            request.execution_id
        );
        let outcome = self.fallback.execute(&request).await;
        if self.config.audit.log_fallback {
            self.record(&request, &outcome.to_result(), None).await;
        }

        DispatchReport {
            execution_id: request.execution_id,
            output: outcome.render(),
            served_by: ServedBy::LocalSandbox,
            attempts,
        }
    }

    async fn record(&self, request: &ExecutionRequest, result: &ExecutionResult, status: Option<i32>) {
        let Some(audit) = &self.audit else {
            return;
        };
        if let Err(e) = audit
            .append(&request.code, &result.stdout, status, Some(&result.stderr))
            .await
        {
            log::error!(
                "Failed to write audit entry for execution {}: {}",
                request.execution_id,
                e
            );
        }
    }
}

#[cfg(test)]
mod tests;
