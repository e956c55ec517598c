//! Child-process protocol engine for the external executor.
//!
//! Spawns the executor, feeds it a sanitized instruction as its final
//! argument, and consumes stdout line-by-line as a stream of JSON protocol
//! events. On first observation of a logical-completion event the engine
//! terminates the child after a short grace delay instead of waiting for a
//! natural exit; a caller timeout and an external cancel flag drive the same
//! termination path. Output is read concurrently while the child runs to
//! avoid pipe deadlocks, and bounded in memory.

use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::events::{LineOutcome, StreamState, Usage};

/// Interval between child liveness checks while a run is in flight.
const POLL_SLICE: Duration = Duration::from_millis(100);

/// Cooperative cancellation handle shared between a caller and the engine.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One executor invocation.
#[derive(Debug, Clone)]
pub struct RunSpec {
    /// Full argv for the executor; the sanitized instruction is appended last.
    pub command: Vec<String>,
    /// Instruction payload fed to the executor.
    pub instruction: String,
    /// Environment overrides for the child.
    pub env: Vec<(String, String)>,
    /// Total wall-clock budget for the run.
    pub timeout: Duration,
    /// External cancellation signal, if any.
    pub cancel: Option<CancelFlag>,
}

/// Engine tuning knobs, threaded in explicitly at construction.
#[derive(Debug, Clone)]
pub struct EngineLimits {
    /// Delay between observing logical completion and terminating the child,
    /// letting any final buffered output flush.
    pub completion_grace: Duration,
    /// Bounded wait after a kill request before forcing a second kill.
    pub kill_grace: Duration,
    /// Truncate retained stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
    /// Emit a debug trace per protocol event.
    pub debug: bool,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            completion_grace: Duration::from_millis(150),
            kill_grace: Duration::from_secs(2),
            output_limit_bytes: 1_000_000,
            debug: false,
        }
    }
}

/// Structured result of one executor invocation.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// The argv that was executed (instruction excluded).
    pub command: Vec<String>,
    /// Raw process exit code, if the process exited normally.
    pub exit_code: Option<i32>,
    /// Termination signal, on unix, if the process was signalled.
    pub signal: Option<i32>,
    /// Captured stdout text (bounded).
    pub stdout: String,
    /// Captured stderr text (bounded).
    pub stderr: String,
    /// Ordered parsed protocol events.
    pub events: Vec<Value>,
    /// First-seen thread identifier.
    pub thread_id: Option<String>,
    /// Most-recent turn identifier.
    pub turn_id: Option<String>,
    /// Most-recent completed agent-message text.
    pub final_message: Option<String>,
    /// Usage metrics from the last completed turn.
    pub usage: Option<Usage>,
    /// Completion type tag, when a terminal event was observed.
    pub completion: Option<String>,
    /// The child was proactively terminated after logical completion.
    pub killed_after_completion: bool,
    /// The run exceeded its wall-clock budget.
    pub timed_out: bool,
    /// The run was cancelled externally.
    pub aborted: bool,
    /// Count of stdout lines that failed protocol parsing.
    pub anomalies: u32,
}

impl RunResult {
    /// Exit code with completion normalization applied.
    ///
    /// When the child was terminated *because* logical completion was
    /// detected, the authoritative success signal is the completion event,
    /// not the signal-induced process status.
    pub fn effective_exit_code(&self) -> Option<i32> {
        if self.killed_after_completion && !self.timed_out && !self.aborted {
            return Some(0);
        }
        self.exit_code
    }

    pub fn is_success(&self) -> bool {
        self.effective_exit_code() == Some(0)
    }
}

/// Collapse literal line breaks to single spaces so the instruction survives
/// the argv boundary unambiguously.
pub fn sanitize_instruction(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.chars() {
        if ch == '\n' || ch == '\r' {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(ch);
    }
    out.trim().to_string()
}

struct ProtocolShared {
    state: Mutex<StreamState>,
    completion_at: Mutex<Option<Instant>>,
}

/// Run the executor once and return a structured result.
///
/// Spawn failure surfaces as an error; everything after a successful spawn is
/// reported through the [`RunResult`], including timeout and cancellation.
#[instrument(skip_all, fields(timeout_secs = spec.timeout.as_secs()))]
pub fn run_protocol(spec: &RunSpec, limits: &EngineLimits) -> Result<RunResult> {
    let (program, args) = spec
        .command
        .split_first()
        .ok_or_else(|| anyhow!("executor command must not be empty"))?;

    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.arg(sanitize_instruction(&spec.instruction));
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(program = %program, "spawning executor");
    let deadline = Instant::now() + spec.timeout;
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            error!(program = %program, err = %err, "failed to spawn executor");
            return Err(err).with_context(|| format!("spawn executor {program}"));
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let shared = Arc::new(ProtocolShared {
        state: Mutex::new(StreamState::default()),
        completion_at: Mutex::new(None),
    });

    let stdout_shared = Arc::clone(&shared);
    let stdout_limit = limits.output_limit_bytes;
    let debug_events = limits.debug;
    let stdout_handle =
        thread::spawn(move || read_protocol_stream(stdout, stdout_limit, &stdout_shared, debug_events));
    let stderr_limit = limits.output_limit_bytes;
    let stderr_handle = thread::spawn(move || read_limited(stderr, stderr_limit));

    let mut timed_out = false;
    let mut aborted = false;
    let mut killed_after_completion = false;

    let status = loop {
        if let Some(status) = child.wait_timeout(POLL_SLICE).context("wait for executor")? {
            break status;
        }
        if spec.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
            warn!("run cancelled, terminating executor");
            aborted = true;
            break terminate(&mut child, limits.kill_grace)?;
        }
        if Instant::now() >= deadline {
            warn!(timeout_secs = spec.timeout.as_secs(), "executor timed out, terminating");
            timed_out = true;
            break terminate(&mut child, limits.kill_grace)?;
        }
        let completion_seen = *shared
            .completion_at
            .lock()
            .map_err(|_| anyhow!("completion tracking poisoned"))?;
        if let Some(at) = completion_seen
            && at.elapsed() >= limits.completion_grace
        {
            debug!("logical completion observed, terminating executor");
            killed_after_completion = true;
            break terminate(&mut child, limits.kill_grace)?;
        }
    };

    let (stdout_raw, stdout_truncated) = join_reader(stdout_handle).context("join stdout")?;
    let (stderr_raw, stderr_truncated) = join_reader(stderr_handle).context("join stderr")?;
    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "executor output truncated");
    }

    let state = shared
        .state
        .lock()
        .map_err(|_| anyhow!("stream state poisoned"))?
        .clone();

    debug!(
        exit_code = ?status.code(),
        completion = state.completion.as_deref(),
        events = state.events.len(),
        anomalies = state.anomalies,
        timed_out,
        aborted,
        "executor finished"
    );

    Ok(RunResult {
        command: spec.command.clone(),
        exit_code: status.code(),
        signal: exit_signal(&status),
        stdout: String::from_utf8_lossy(&stdout_raw).into_owned(),
        stderr: String::from_utf8_lossy(&stderr_raw).into_owned(),
        events: state.events,
        thread_id: state.thread_id,
        turn_id: state.turn_id,
        final_message: state.final_message,
        usage: state.usage,
        completion: state.completion,
        killed_after_completion,
        timed_out,
        aborted,
        anomalies: state.anomalies,
    })
}

/// Kill the child, wait out the grace window, and force a second kill if it
/// has still not exited.
fn terminate(child: &mut Child, kill_grace: Duration) -> Result<ExitStatus> {
    if let Err(err) = child.kill() {
        // The child may have exited between the liveness check and the kill.
        debug!(err = %err, "kill request failed");
    }
    match child.wait_timeout(kill_grace).context("wait after kill")? {
        Some(status) => Ok(status),
        None => {
            warn!("executor survived kill grace window, forcing");
            if let Err(err) = child.kill() {
                debug!(err = %err, "forced kill request failed");
            }
            child.wait().context("wait executor after forced kill")
        }
    }
}

fn join_reader(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

/// Consume the protocol stream line-by-line, folding each line into the
/// shared accumulators while retaining bounded raw output.
fn read_protocol_stream<R: Read>(
    reader: R,
    limit: usize,
    shared: &ProtocolShared,
    debug_events: bool,
) -> Result<(Vec<u8>, usize)> {
    let mut buf_reader = BufReader::new(reader);
    let mut collected = Vec::new();
    let mut truncated = 0usize;

    loop {
        let mut line = Vec::new();
        let n = buf_reader
            .read_until(b'\n', &mut line)
            .context("read stdout line")?;
        if n == 0 {
            break;
        }

        let remaining = limit.saturating_sub(collected.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            collected.extend_from_slice(&line[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }

        let text = String::from_utf8_lossy(&line);
        let is_final_fragment = !line.ends_with(b"\n");
        if is_final_fragment && serde_json::from_str::<Value>(text.trim()).is_err() {
            // Partial JSON cut off at stream end; discard silently.
            debug!("discarding partial trailing output");
            continue;
        }

        let mut state = shared
            .state
            .lock()
            .map_err(|_| anyhow!("stream state poisoned"))?;
        match state.observe_line(&text) {
            LineOutcome::Anomaly => {
                warn!(line = %text.trim(), "non-JSON line on protocol stream");
            }
            LineOutcome::Event => {
                if debug_events && let Some(event) = state.events.last() {
                    debug!(event = %event, "protocol event");
                }
                if state.completion.is_some() {
                    let mut completion_at = shared
                        .completion_at
                        .lock()
                        .map_err(|_| anyhow!("completion tracking poisoned"))?;
                    if completion_at.is_none() {
                        *completion_at = Some(Instant::now());
                    }
                }
            }
            LineOutcome::Empty => {}
        }
    }

    Ok((collected, truncated))
}

/// Drain a stream with a size limit (bytes beyond the limit are discarded
/// while still emptying the pipe).
fn read_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}
