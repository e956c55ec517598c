//! Deterministic composition of human-readable failure strings.
//!
//! Failures must be diagnosable without replaying the run, so every failure
//! string is composed from the same parts in the same priority order:
//! non-zero exit code, captured stderr, then a bounded snippet of the most
//! relevant output (stdout or the best unparsed candidate).

/// Upper bound for embedded output snippets.
pub const SNIPPET_LIMIT: usize = 400;

/// Truncate `text` to at most `limit` bytes on a char boundary, marking the cut.
pub fn snippet(text: &str, limit: usize) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= limit {
        return trimmed.to_string();
    }
    let mut end = limit;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &trimmed[..end])
}

/// Compose a failure diagnostic from exit code, stderr, and a fallback snippet.
///
/// All present parts are included, in priority order; when nothing was
/// captured the result says so rather than being empty.
pub fn compose_diagnostic(exit_code: Option<i32>, stderr: &str, fallback: &str) -> String {
    let mut parts = Vec::new();
    if let Some(code) = exit_code.filter(|code| *code != 0) {
        parts.push(format!("exit code {code}"));
    }
    if !stderr.trim().is_empty() {
        parts.push(format!("stderr: {}", snippet(stderr, SNIPPET_LIMIT)));
    }
    if !fallback.trim().is_empty() {
        parts.push(format!("output: {}", snippet(fallback, SNIPPET_LIMIT)));
    }
    if parts.is_empty() {
        return "no diagnostic output captured".to_string();
    }
    parts.join("; ")
}
