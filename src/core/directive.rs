//! Parsing of the trailing control directive each agent reply must carry.
//!
//! Agents end their reply with a line of the form
//! `CONTROL_JSON: {"action": "continue"}`. The parser locates the *last*
//! occurrence of the marker, parses everything after it as JSON (tolerating a
//! fenced-code wrapper or surrounding prose), and classifies the payload.
//! Parsing is idempotent: the same text always yields the same outcome.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Marker preceding the machine-readable control payload.
pub const DIRECTIVE_MARKER: &str = "CONTROL_JSON:";

/// Fields carried by a `request_iteration` directive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationRequest {
    /// Base name of the blueprint to re-run. Defaults to the requester's own.
    pub target_agent: Option<String>,
    /// Override instructions for the re-run.
    pub instructions: Option<String>,
    /// Stated reason for the iteration.
    pub reason: Option<String>,
    /// Base name of a follow-up agent to append after the target.
    pub next_agent: Option<String>,
    /// Instructions for the follow-up agent.
    pub next_instructions: Option<String>,
}

/// Classification of an agent reply's trailing directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveOutcome {
    /// No marker, or the trailing text could not be parsed as JSON.
    Missing,
    /// Parsed JSON whose action is absent or not a known directive.
    Unsupported { action: Option<String> },
    /// The agent declares its objective met; advance the queue.
    Continue,
    /// The agent requests re-running a blueprint with corrections.
    RequestIteration(IterationRequest),
}

/// Parse the control directive from free-text agent output.
pub fn parse_directive(text: &str) -> DirectiveOutcome {
    let Some(idx) = text.rfind(DIRECTIVE_MARKER) else {
        return DirectiveOutcome::Missing;
    };
    let tail = &text[idx + DIRECTIVE_MARKER.len()..];
    let Some(payload) = extract_json_payload(tail) else {
        return DirectiveOutcome::Missing;
    };
    classify(&payload)
}

/// Leniently extract a JSON value from free text.
///
/// Attempts, in order: the raw trimmed text, the body of a fenced ``` block,
/// and the outermost `{...}` substring.
pub fn extract_json_payload(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }
    if let Some(inner) = strip_code_fence(trimmed)
        && let Ok(value) = serde_json::from_str(inner)
    {
        return Some(value);
    }
    let inner = outermost_object(trimmed)?;
    serde_json::from_str(inner).ok()
}

fn strip_code_fence(text: &str) -> Option<&str> {
    let body = text.strip_prefix("```")?;
    // Skip an optional language tag on the opening fence line.
    let body = match body.find('\n') {
        Some(idx) => &body[idx + 1..],
        None => body,
    };
    let end = body.rfind("```")?;
    Some(body[..end].trim())
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn classify(payload: &Value) -> DirectiveOutcome {
    let Some(object) = payload.as_object() else {
        return DirectiveOutcome::Unsupported { action: None };
    };
    let action = object.get("action").and_then(Value::as_str);
    match action {
        Some("continue") => DirectiveOutcome::Continue,
        Some("request_iteration") => DirectiveOutcome::RequestIteration(IterationRequest {
            target_agent: first_string(payload, &["target_agent", "target"]),
            instructions: first_string(
                payload,
                &["instructions", "updated_instructions", "details", "fix"],
            ),
            reason: first_string(payload, &["reason", "summary"]),
            next_agent: first_string(payload, &["next_agent", "follow_up_agent"]),
            next_instructions: first_string(payload, &["next_instructions", "follow_up_instructions"]),
        }),
        Some(other) => DirectiveOutcome::Unsupported {
            action: Some(other.to_string()),
        },
        // Legacy payloads used `status` instead of `action`, for `continue` only.
        None => match object.get("status").and_then(Value::as_str) {
            Some("continue") => DirectiveOutcome::Continue,
            other => DirectiveOutcome::Unsupported {
                action: other.map(str::to_string),
            },
        },
    }
}

/// First matching key wins, per field.
fn first_string(payload: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(text) = payload.get(key).and_then(Value::as_str) {
            return Some(text.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_continue() {
        let text = "All checks pass.\nCONTROL_JSON: {\"action\":\"continue\"}";
        assert_eq!(parse_directive(text), DirectiveOutcome::Continue);
    }

    #[test]
    fn parses_legacy_status_continue() {
        let text = "done\nCONTROL_JSON: {\"status\":\"continue\"}";
        assert_eq!(parse_directive(text), DirectiveOutcome::Continue);
    }

    #[test]
    fn last_marker_wins() {
        let text = concat!(
            "Earlier I wrote CONTROL_JSON: {\"action\":\"request_iteration\"} as an example.\n",
            "CONTROL_JSON: {\"action\":\"continue\"}"
        );
        assert_eq!(parse_directive(text), DirectiveOutcome::Continue);
    }

    #[test]
    fn parses_fenced_payload() {
        let text = "summary\nCONTROL_JSON:\n```json\n{\"action\":\"continue\"}\n```";
        assert_eq!(parse_directive(text), DirectiveOutcome::Continue);
    }

    #[test]
    fn extracts_object_from_surrounding_prose() {
        let text = "CONTROL_JSON: here you go {\"action\":\"continue\"} hope that helps";
        assert_eq!(parse_directive(text), DirectiveOutcome::Continue);
    }

    #[test]
    fn missing_marker_is_missing() {
        assert_eq!(parse_directive("no directive here"), DirectiveOutcome::Missing);
    }

    #[test]
    fn unparsable_tail_is_missing() {
        assert_eq!(
            parse_directive("CONTROL_JSON: not json at all"),
            DirectiveOutcome::Missing
        );
    }

    #[test]
    fn unknown_action_is_unsupported() {
        assert_eq!(
            parse_directive("CONTROL_JSON: {\"action\":\"celebrate\"}"),
            DirectiveOutcome::Unsupported {
                action: Some("celebrate".to_string())
            }
        );
    }

    #[test]
    fn object_without_action_is_unsupported() {
        assert_eq!(
            parse_directive("CONTROL_JSON: {\"done\":true}"),
            DirectiveOutcome::Unsupported { action: None }
        );
    }

    #[test]
    fn iteration_request_reads_aliases_first_match_wins() {
        let text = concat!(
            "CONTROL_JSON: {\"action\":\"request_iteration\",",
            "\"target\":\"tester\",",
            "\"fix\":\"re-run suite\",",
            "\"summary\":\"flaky test\",",
            "\"follow_up_agent\":\"implementer\"}"
        );
        let DirectiveOutcome::RequestIteration(request) = parse_directive(text) else {
            panic!("expected iteration request");
        };
        assert_eq!(request.target_agent.as_deref(), Some("tester"));
        assert_eq!(request.instructions.as_deref(), Some("re-run suite"));
        assert_eq!(request.reason.as_deref(), Some("flaky test"));
        assert_eq!(request.next_agent.as_deref(), Some("implementer"));
        assert_eq!(request.next_instructions, None);
    }

    #[test]
    fn canonical_keys_shadow_aliases() {
        let text = concat!(
            "CONTROL_JSON: {\"action\":\"request_iteration\",",
            "\"target_agent\":\"tester\",\"target\":\"ignored\",",
            "\"instructions\":\"fix X\",\"details\":\"ignored\"}"
        );
        let DirectiveOutcome::RequestIteration(request) = parse_directive(text) else {
            panic!("expected iteration request");
        };
        assert_eq!(request.target_agent.as_deref(), Some("tester"));
        assert_eq!(request.instructions.as_deref(), Some("fix X"));
    }

    #[test]
    fn parsing_is_idempotent() {
        let text = "body\nCONTROL_JSON: {\"action\":\"request_iteration\",\"target_agent\":\"a\"}";
        assert_eq!(parse_directive(text), parse_directive(text));
    }
}
