//! Gating predicate for the command-timeout safety block.
//!
//! Agents whose remit touches testing or verification tend to launch
//! long-running commands; their instructions get an extra block mandating an
//! explicit timeout on every command. The predicate is a whole-word,
//! case-insensitive match over the agent's combined text fields, kept
//! explicit here rather than buried in template interpolation.

use std::sync::LazyLock;

use regex::Regex;

static SAFETY_TERMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(test|tests|testing|qa|verify|verification|verifier|validate|validation|validator|compliance|review|reviewer)\b",
    )
    .expect("safety terms pattern should be valid")
});

/// Whether the agent's combined name/role/objective/instructions text calls
/// for the command-timeout safety block.
pub fn needs_command_timeouts(combined_text: &str) -> bool {
    SAFETY_TERMS.is_match(combined_text)
}
