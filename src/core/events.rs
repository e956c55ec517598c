//! Classification of the executor's line-delimited JSON event stream.
//!
//! The external executor emits one JSON object per stdout line. Events carry a
//! `type` tag; a fixed subset of tags denotes *logical completion* of the
//! underlying conversational turn or thread, which is authoritative over the
//! raw process exit code.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event types that signal logical completion of a run.
pub const COMPLETION_EVENT_TYPES: [&str; 5] = [
    "turn.completed",
    "thread.completed",
    "thread.failed",
    "thread.error",
    "thread.aborted",
];

/// Stderr substrings (lowercase) that indicate a fatal executor-side fault
/// even when the agent's directive claims success.
pub const FATAL_STDERR_MARKERS: [&str; 4] = [
    "permission denied",
    "not logged in",
    "invalid api key",
    "rate limit",
];

/// The `type` tag of an event, if present.
pub fn event_type(event: &Value) -> Option<&str> {
    event.get("type")?.as_str()
}

/// The event's type tag when it denotes logical completion.
pub fn completion_type(event: &Value) -> Option<&str> {
    let tag = event_type(event)?;
    COMPLETION_EVENT_TYPES.contains(&tag).then_some(tag)
}

/// Thread identifier carried by an event, if any.
pub fn thread_id_of(event: &Value) -> Option<&str> {
    event.get("thread_id")?.as_str()
}

/// Turn identifier carried by an event, if any.
pub fn turn_id_of(event: &Value) -> Option<&str> {
    event.get("turn_id")?.as_str()
}

/// Text of a completed agent-authored message item.
///
/// Matches `item.completed` events whose item is an `agent_message`; the text
/// is taken from `item.text` or, failing that, by concatenating the `text` of
/// `item.content` sub-blocks.
pub fn agent_message_text(event: &Value) -> Option<String> {
    if event_type(event)? != "item.completed" {
        return None;
    }
    let item = event.get("item")?;
    if item.get("type")?.as_str()? != "agent_message" {
        return None;
    }
    if let Some(text) = item.get("text").and_then(Value::as_str) {
        return Some(text.to_string());
    }
    let blocks = item.get("content")?.as_array()?;
    let mut buf = String::new();
    for block in blocks {
        if let Some(text) = block.get("text").and_then(Value::as_str) {
            buf.push_str(text);
        }
    }
    (!buf.is_empty()).then_some(buf)
}

/// Token usage reported by a completed turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub cached_input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

/// Usage metrics from a `turn.completed` event, if present.
pub fn usage_of(event: &Value) -> Option<Usage> {
    if event_type(event)? != "turn.completed" {
        return None;
    }
    serde_json::from_value(event.get("usage")?.clone()).ok()
}

/// How a single stdout line was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Blank line, ignored.
    Empty,
    /// Parsed as a protocol event and folded into the accumulators.
    Event,
    /// Failed JSON parsing (or was not an object); counted, never fatal.
    Anomaly,
}

/// Run-scoped accumulators updated as the event stream arrives.
#[derive(Debug, Clone, Default)]
pub struct StreamState {
    /// Ordered sequence of parsed events.
    pub events: Vec<Value>,
    /// First-seen thread identifier.
    pub thread_id: Option<String>,
    /// Most-recent turn identifier.
    pub turn_id: Option<String>,
    /// Most-recent completed agent-message text.
    pub final_message: Option<String>,
    /// Most-recent turn usage metrics.
    pub usage: Option<Usage>,
    /// First-observed completion type tag.
    pub completion: Option<String>,
    /// Count of lines that failed protocol parsing.
    pub anomalies: u32,
}

impl StreamState {
    /// Fold one stdout line into the accumulators.
    pub fn observe_line(&mut self, line: &str) -> LineOutcome {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return LineOutcome::Empty;
        }
        let Ok(event) = serde_json::from_str::<Value>(trimmed) else {
            self.anomalies += 1;
            return LineOutcome::Anomaly;
        };
        if !event.is_object() {
            self.anomalies += 1;
            return LineOutcome::Anomaly;
        }
        if self.thread_id.is_none()
            && let Some(id) = thread_id_of(&event)
        {
            self.thread_id = Some(id.to_string());
        }
        if let Some(id) = turn_id_of(&event) {
            self.turn_id = Some(id.to_string());
        }
        if let Some(text) = agent_message_text(&event) {
            self.final_message = Some(text);
        }
        if let Some(usage) = usage_of(&event) {
            self.usage = Some(usage);
        }
        if self.completion.is_none()
            && let Some(tag) = completion_type(&event)
        {
            self.completion = Some(tag.to_string());
        }
        self.events.push(event);
        LineOutcome::Event
    }
}

/// Collect execution-error signals from a finished run.
///
/// A directive that claims `continue` is not accepted as success when the
/// run's own stream shows error-typed events, non-success item statuses, or
/// stderr matching known fatal substrings.
pub fn scan_execution_errors(events: &[Value], stderr: &str) -> Vec<String> {
    let mut errors = Vec::new();
    for event in events {
        match event_type(event) {
            Some("error") => {
                let message = event
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unspecified");
                errors.push(format!("error event: {message}"));
            }
            Some(tag @ ("turn.failed" | "thread.failed" | "thread.error" | "thread.aborted")) => {
                errors.push(format!("terminal failure event {tag}"));
            }
            Some("item.completed") => {
                if let Some(status) = event
                    .get("item")
                    .and_then(|item| item.get("status"))
                    .and_then(Value::as_str)
                    && matches!(status, "failed" | "errored")
                {
                    errors.push(format!("item finished with status {status}"));
                }
            }
            _ => {}
        }
    }
    let lowered = stderr.to_lowercase();
    for marker in FATAL_STDERR_MARKERS {
        if lowered.contains(marker) {
            errors.push(format!("stderr reports '{marker}'"));
        }
    }
    errors
}
