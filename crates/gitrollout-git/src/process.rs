//! Process execution for event commands.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use gitrollout_core::{CommandInvocation, Result, RolloutError};
use tokio::process::Command;
use tracing::debug;

/// Bytes of command output kept for reporting.
const OUTPUT_TAIL: usize = 2048;

/// How an event command finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Exit code, `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// The last part of stderr (or stdout if stderr was empty).
    pub output: String,
    /// Wall-clock run time.
    pub duration: Duration,
}

impl CommandOutcome {
    /// Creates an outcome with the given exit code and no output.
    pub fn exited(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            output: String::new(),
            duration: Duration::ZERO,
        }
    }

    /// Returns true if the command exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Short human-readable summary of a failed run.
    pub fn describe(&self) -> String {
        let status = match self.exit_code {
            Some(code) => format!("exited with status {}", code),
            None => "terminated by signal".to_string(),
        };
        if self.output.is_empty() {
            status
        } else {
            format!("{}: {}", status, self.output)
        }
    }
}

/// Runs a rendered event command to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `invocation`, killing it once `timeout` elapses.
    ///
    /// A non-zero exit is a successful run with a failing outcome. Spawn
    /// failures return `CommandFailed`; an expired timeout returns `Timeout`.
    async fn run(&self, invocation: &CommandInvocation, timeout: Duration) -> Result<CommandOutcome>;
}

/// [`CommandRunner`] that spawns OS processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &CommandInvocation, timeout: Duration) -> Result<CommandOutcome> {
        let program = invocation.program();

        let mut cmd = Command::new(program);
        cmd.args(invocation.args())
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            program,
            cwd = %invocation.working_dir.display(),
            "running event command"
        );

        let started = Instant::now();
        let child = cmd
            .spawn()
            .map_err(|e| RolloutError::command_failed(program, None, format!("failed to spawn: {}", e)))?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output.map_err(|e| {
                RolloutError::command_failed(program, None, format!("failed to wait: {}", e))
            })?,
            Err(_) => {
                return Err(RolloutError::timeout(
                    format!("command '{}'", program),
                    timeout.as_secs(),
                ));
            },
        };

        let stream = if output.stderr.is_empty() {
            &output.stdout
        } else {
            &output.stderr
        };

        Ok(CommandOutcome {
            exit_code: output.status.code(),
            output: tail(&String::from_utf8_lossy(stream)),
            duration: started.elapsed(),
        })
    }
}

fn tail(text: &str) -> String {
    let text = text.trim();
    if text.len() <= OUTPUT_TAIL {
        return text.to_string();
    }
    let mut start = text.len() - OUTPUT_TAIL;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}
