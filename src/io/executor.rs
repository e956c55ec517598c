//! Executor abstraction for agent invocation.
//!
//! The [`Executor`] trait decouples mission orchestration from the actual
//! agent backend (an external CLI such as `codex exec`). Tests use scripted
//! executors that return predetermined results without spawning processes.

use std::time::Duration;

use anyhow::Result;
use tracing::instrument;

use crate::io::config::ConductorConfig;
use crate::io::process::{CancelFlag, EngineLimits, RunResult, RunSpec, run_protocol};

/// Parameters for one executor invocation.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    /// Instruction payload for the agent.
    pub instruction: String,
    /// Prior thread identifier to resume, if any.
    pub resume_thread: Option<String>,
    /// Extra invocation arguments appended to the configured argv.
    pub extra_args: Vec<String>,
    /// Environment overrides for the child process.
    pub env: Vec<(String, String)>,
    /// Wall-clock budget for the run.
    pub timeout: Duration,
    /// External cancellation signal, if any.
    pub cancel: Option<CancelFlag>,
}

impl ExecRequest {
    /// A plain request with only an instruction and a timeout.
    pub fn new(instruction: impl Into<String>, timeout: Duration) -> Self {
        Self {
            instruction: instruction.into(),
            resume_thread: None,
            extra_args: Vec::new(),
            env: Vec::new(),
            timeout,
            cancel: None,
        }
    }
}

/// Abstraction over agent execution backends.
pub trait Executor {
    /// Run the executor once and return its structured result.
    fn run(&self, request: &ExecRequest) -> Result<RunResult>;
}

/// Executor that spawns the configured external CLI.
#[derive(Debug, Clone)]
pub struct CliExecutor {
    command: Vec<String>,
    limits: EngineLimits,
}

impl CliExecutor {
    pub fn new(command: Vec<String>, limits: EngineLimits) -> Self {
        Self { command, limits }
    }

    pub fn from_config(config: &ConductorConfig) -> Self {
        let mut command = config.executor.command.clone();
        command.extend(config.executor.extra_args.iter().cloned());
        Self::new(command, config.engine_limits())
    }

    /// Full argv for a request, instruction excluded (the engine appends it).
    fn command_line(&self, request: &ExecRequest) -> Vec<String> {
        let mut command = self.command.clone();
        if let Some(thread) = &request.resume_thread {
            command.push("resume".to_string());
            command.push(thread.clone());
        }
        command.extend(request.extra_args.iter().cloned());
        command
    }
}

impl Executor for CliExecutor {
    #[instrument(skip_all, fields(
        timeout_secs = request.timeout.as_secs(),
        resuming = request.resume_thread.is_some()
    ))]
    fn run(&self, request: &ExecRequest) -> Result<RunResult> {
        let spec = RunSpec {
            command: self.command_line(request),
            instruction: request.instruction.clone(),
            env: request.env.clone(),
            timeout: request.timeout,
            cancel: request.cancel.clone(),
        };
        run_protocol(&spec, &self.limits)
    }
}
