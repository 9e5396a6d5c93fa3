// src/executors/process.rs
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// What happened to a child process run under a wall-clock limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Exited {
        stdout: String,
        stderr: String,
        return_code: i32,
    },
    TimedOut,
}

/// Spawns `command` with captured output and waits at most `timeout` for it.
///
/// The child is configured with `kill_on_drop`, so when the limit expires the
/// pending wait is dropped and the process is killed. A process terminated by
/// a signal reports `-1` as its return code.
pub async fn run_with_timeout(
    mut command: Command,
    timeout: Duration,
) -> std::io::Result<ProcessOutcome> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command.spawn()?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => {
            let output = output?;
            Ok(ProcessOutcome::Exited {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                return_code: output.status.code().unwrap_or(-1),
            })
        }
        Err(_) => {
            log::warn!("Process exceeded {:?}, killing it", timeout);
            Ok(ProcessOutcome::TimedOut)
        }
    }
}
