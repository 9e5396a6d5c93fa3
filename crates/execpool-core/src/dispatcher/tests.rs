use super::*;
use crate::core_types::NodeReply;
use crate::executors::SandboxOutcome;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum Script {
    Refuse,
    Reply(&'static str, &'static str, i32),
}

struct ScriptedTransport {
    script: Mutex<VecDeque<Script>>,
    calls: Mutex<Vec<(usize, ExecutionRequest)>>,
}

impl ScriptedTransport {
    fn new(script: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(usize, ExecutionRequest)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NodeTransport for ScriptedTransport {
    async fn send(&self, index: usize, request: &ExecutionRequest) -> AttemptOutcome {
        self.calls.lock().unwrap().push((index, request.clone()));
        let next = self.script.lock().unwrap().pop_front().unwrap_or(Script::Refuse);
        match next {
            Script::Refuse => AttemptOutcome::Transport(TransportError::Connect {
                url: format!("http://executor-{}:5000/execute", index),
                message: "connection refused".to_string(),
            }),
            Script::Reply(stdout, stderr, code) => AttemptOutcome::Completed(NodeReply {
                status_code: 200,
                result: ExecutionResult {
                    execution_id: request.execution_id,
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                    return_code: code,
                    success: code == 0,
                },
            }),
        }
    }
}

struct CountingFallback {
    calls: AtomicUsize,
}

impl CountingFallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocalExecutor for CountingFallback {
    async fn execute(&self, request: &ExecutionRequest) -> SandboxOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        SandboxOutcome::Completed(ExecutionResult {
            execution_id: request.execution_id,
            stdout: "local\n".to_string(),
            stderr: String::new(),
            return_code: 0,
            success: true,
        })
    }
}

struct FixedSelector(usize);

impl NodeSelector for FixedSelector {
    fn pick(&self, _pool_size: usize) -> usize {
        self.0
    }
}

fn test_config(pool_size: usize) -> Arc<ExecPoolConfig> {
    let mut config = ExecPoolConfig::default();
    config.pool.pool_size = pool_size;
    Arc::new(config)
}

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        backoff: Duration::from_millis(1),
    }
}

fn dispatcher(
    config: Arc<ExecPoolConfig>,
    transport: Arc<ScriptedTransport>,
    fallback: Arc<CountingFallback>,
) -> Dispatcher {
    Dispatcher::new(config)
        .with_transport(transport)
        .with_fallback(fallback)
        .with_selector(Arc::new(RandomSelector::from_seed(3)))
        .with_retry_policy(fast_policy(3))
}

#[tokio::test]
async fn test_all_nodes_unreachable_falls_back_once() {
    let transport = ScriptedTransport::new(vec![]);
    let fallback = CountingFallback::new();
    let audit = AuditLogStore::in_memory().await.unwrap();
    let dispatcher =
        dispatcher(test_config(3), transport.clone(), fallback.clone()).with_audit_log(audit.clone());

    let report = dispatcher.dispatch(ExecutionRequest::new("print(1)", 10)).await;

    assert_eq!(transport.calls().len(), 3);
    assert_eq!(fallback.calls(), 1);
    assert_eq!(report.served_by, ServedBy::LocalSandbox);
    assert_eq!(report.output, "local\n");
    assert_eq!(report.attempts.len(), 3);
    assert!(report.attempts.iter().all(|a| a.error.is_some()));

    // Transport failures are never audited; the fallback result is.
    let entries = audit.list_all().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].response_status_code, None);
    assert_eq!(entries[0].result, "local\n");
}

#[tokio::test]
async fn test_fallback_audit_can_be_disabled() {
    let mut config = ExecPoolConfig::default();
    config.audit.log_fallback = false;
    let audit = AuditLogStore::in_memory().await.unwrap();
    let dispatcher = dispatcher(Arc::new(config), ScriptedTransport::new(vec![]), CountingFallback::new())
        .with_audit_log(audit.clone());

    dispatcher.execute("print(1)", Some(5)).await;

    assert!(audit.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_successful_reply_returns_stdout_exactly() {
    let transport = ScriptedTransport::new(vec![Script::Reply("7\n", "", 0)]);
    let fallback = CountingFallback::new();
    let audit = AuditLogStore::in_memory().await.unwrap();
    let dispatcher =
        dispatcher(test_config(1), transport.clone(), fallback.clone()).with_audit_log(audit.clone());

    let output = dispatcher.execute("print(3 + 4)", None).await;

    assert_eq!(output, "7\n");
    assert_eq!(transport.calls().len(), 1);
    assert_eq!(fallback.calls(), 0);

    let entries = audit.list_all().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].code, "print(3 + 4)");
    assert_eq!(entries[0].result, "7\n");
    assert_eq!(entries[0].response_status_code, Some(200));
}

#[tokio::test]
async fn test_program_error_is_not_retried() {
    let transport = ScriptedTransport::new(vec![Script::Reply(
        "",
        "ZeroDivisionError: division by zero",
        1,
    )]);
    let fallback = CountingFallback::new();
    let dispatcher = dispatcher(test_config(3), transport.clone(), fallback.clone());

    let report = dispatcher.dispatch(ExecutionRequest::new("1/0", 10)).await;

    assert_eq!(transport.calls().len(), 1);
    assert_eq!(fallback.calls(), 0);
    assert_eq!(
        report.output,
        "Output:\n\n\nWarnings/Errors:\nZeroDivisionError: division by zero"
    );
    assert!(matches!(report.served_by, ServedBy::Node { .. }));
}

#[tokio::test]
async fn test_transient_failure_then_success() {
    let transport = ScriptedTransport::new(vec![Script::Refuse, Script::Reply("ok\n", "", 0)]);
    let fallback = CountingFallback::new();
    let dispatcher = dispatcher(test_config(3), transport.clone(), fallback.clone());

    let report = dispatcher.dispatch(ExecutionRequest::new("print('ok')", 10)).await;

    assert_eq!(report.output, "ok\n");
    assert_eq!(report.attempts.len(), 2);
    assert!(report.attempts[0].error.is_some());
    assert!(report.attempts[1].error.is_none());
    assert_eq!(fallback.calls(), 0);
}

#[tokio::test]
async fn test_every_attempt_reuses_the_execution_id() {
    let transport = ScriptedTransport::new(vec![]);
    let dispatcher = dispatcher(test_config(3), transport.clone(), CountingFallback::new());

    let request = ExecutionRequest::new("print(1)", 10);
    let report = dispatcher.dispatch(request.clone()).await;

    assert_eq!(report.execution_id, request.execution_id);
    assert!(transport.calls().iter().all(|(_, r)| r == &request));
}

#[tokio::test]
async fn test_retries_may_hit_the_same_node() {
    let transport = ScriptedTransport::new(vec![]);
    let dispatcher = dispatcher(test_config(3), transport.clone(), CountingFallback::new())
        .with_selector(Arc::new(FixedSelector(2)));

    dispatcher.dispatch(ExecutionRequest::new("print(1)", 10)).await;

    let indices: Vec<usize> = transport.calls().iter().map(|(i, _)| *i).collect();
    assert_eq!(indices, vec![2, 2, 2]);
}

#[tokio::test]
async fn test_selected_nodes_stay_within_pool() {
    let transport = ScriptedTransport::new(vec![]);
    let dispatcher = dispatcher(test_config(2), transport.clone(), CountingFallback::new())
        .with_retry_policy(fast_policy(50));

    dispatcher.dispatch(ExecutionRequest::new("print(1)", 10)).await;

    let calls = transport.calls();
    assert_eq!(calls.len(), 50);
    assert!(calls.iter().all(|(i, _)| *i == 1 || *i == 2));
}

#[tokio::test]
async fn test_zero_retries_means_one_attempt() {
    let transport = ScriptedTransport::new(vec![]);
    let fallback = CountingFallback::new();
    let dispatcher = dispatcher(test_config(3), transport.clone(), fallback.clone())
        .with_retry_policy(fast_policy(1));

    dispatcher.execute("print(1)", Some(5)).await;

    assert_eq!(transport.calls().len(), 1);
    assert_eq!(fallback.calls(), 1);
}

#[tokio::test]
async fn test_default_timeout_comes_from_config() {
    let mut config = ExecPoolConfig::default();
    config.execution.default_timeout_secs = 42;
    let transport = ScriptedTransport::new(vec![Script::Reply("", "", 0)]);
    let dispatcher = dispatcher(Arc::new(config), transport.clone(), CountingFallback::new());

    dispatcher.execute("pass", None).await;

    assert_eq!(transport.calls()[0].1.timeout_seconds, 42);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_between_attempts_but_not_after_last() {
    let transport = ScriptedTransport::new(vec![]);
    let dispatcher = Dispatcher::new(test_config(3))
        .with_transport(transport.clone())
        .with_fallback(CountingFallback::new())
        .with_selector(Arc::new(RandomSelector::from_seed(9)));

    let started = tokio::time::Instant::now();
    dispatcher.dispatch(ExecutionRequest::new("print(1)", 10)).await;
    let elapsed = started.elapsed();

    assert_eq!(transport.calls().len(), 3);
    // Two 2s pauses for three attempts.
    assert!(elapsed >= Duration::from_secs(4));
    assert!(elapsed < Duration::from_secs(6));
}
