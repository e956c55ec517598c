//! Plan resolution: turn a goal into a validated list of agent blueprints.
//!
//! The resolver composes a planning instruction, runs it through an
//! [`Executor`], and extracts a JSON plan from the response. Attempts are
//! bounded; a retry carries the previous failure's diagnostic so the planner
//! can correct itself. All candidate texts are recorded per attempt for
//! diagnostics regardless of success.

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Result, anyhow};
use jsonschema::{Validator, validator_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::core::diagnostic::{SNIPPET_LIMIT, compose_diagnostic, snippet};
use crate::core::directive::extract_json_payload;
use crate::core::events::agent_message_text;
use crate::io::executor::{ExecRequest, Executor};
use crate::io::process::CancelFlag;
use crate::io::prompt::{PlannerPromptInputs, PromptEngine};

const PLAN_SCHEMA: &str = include_str!("../schemas/plan_output.schema.json");

static PLAN_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| {
    let schema: Value = serde_json::from_str(PLAN_SCHEMA).expect("plan schema should be valid JSON");
    validator_for(&schema).expect("plan schema should compile")
});

/// Immutable agent template produced at planning time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentBlueprint {
    pub name: String,
    pub role: String,
    pub expertise: String,
    pub objective: String,
    pub instructions: String,
}

/// A resolved plan: optional mission summary plus ordered blueprints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub summary: Option<String>,
    pub blueprints: Vec<AgentBlueprint>,
}

/// Diagnostic record of one planning attempt, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanAttemptRecord {
    /// 1-based attempt number.
    pub attempt: u32,
    /// Candidate response texts gathered for this attempt, in priority order.
    pub candidates: Vec<String>,
    /// Failure diagnostic, absent when the attempt produced a plan.
    pub failure: Option<String>,
}

/// Inputs for plan resolution.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub goal: String,
    pub context: Option<String>,
    pub cancel: Option<CancelFlag>,
}

/// Resolve a plan within a bounded attempt budget.
///
/// The observer is called once per attempt with its diagnostic record, in
/// order, including the final successful one.
#[instrument(skip_all, fields(attempts = attempts))]
pub fn resolve_plan<E, F>(
    executor: &E,
    prompts: &PromptEngine,
    request: &PlanRequest,
    attempts: u32,
    timeout: Duration,
    observer: &mut F,
) -> Result<Plan>
where
    E: Executor,
    F: FnMut(PlanAttemptRecord),
{
    let mut last_failure = String::new();
    for attempt in 1..=attempts.max(1) {
        let instruction = prompts.render_planner(&PlannerPromptInputs {
            goal: &request.goal,
            context: request.context.as_deref(),
            retry_diagnostic: (attempt > 1).then_some(last_failure.as_str()),
        })?;
        let exec_request = ExecRequest {
            cancel: request.cancel.clone(),
            ..ExecRequest::new(instruction, timeout)
        };

        let run = match executor.run(&exec_request) {
            Ok(run) => run,
            Err(err) => {
                last_failure = format!("executor failed to run: {err:#}");
                warn!(attempt, failure = %last_failure, "planning attempt failed");
                observer(PlanAttemptRecord {
                    attempt,
                    candidates: Vec::new(),
                    failure: Some(last_failure.clone()),
                });
                continue;
            }
        };

        let candidates = gather_candidates(&run.final_message, &run.events, &run.stdout);
        match accept_plan(&candidates) {
            Ok(plan) => {
                debug!(attempt, agents = plan.blueprints.len(), "plan accepted");
                observer(PlanAttemptRecord {
                    attempt,
                    candidates,
                    failure: None,
                });
                return Ok(plan);
            }
            Err(reject) => {
                let fallback = candidates.first().map(String::as_str).unwrap_or_default();
                let mut failure =
                    compose_diagnostic(run.effective_exit_code(), &run.stderr, fallback);
                if !reject.is_empty() {
                    failure = format!("{reject}; {failure}");
                }
                warn!(attempt, failure = %failure, "planning attempt rejected");
                observer(PlanAttemptRecord {
                    attempt,
                    candidates,
                    failure: Some(failure.clone()),
                });
                last_failure = failure;
            }
        }
    }
    Err(anyhow!("planning failed after {attempts} attempts: {last_failure}"))
}

/// Candidate response texts in priority order: extracted final message, any
/// completed agent-message event, then raw stdout.
fn gather_candidates(
    final_message: &Option<String>,
    events: &[Value],
    stdout: &str,
) -> Vec<String> {
    let mut candidates = Vec::new();
    if let Some(message) = final_message
        && !message.trim().is_empty()
    {
        candidates.push(message.clone());
    }
    for event in events {
        if let Some(text) = agent_message_text(event)
            && !text.trim().is_empty()
            && !candidates.contains(&text)
        {
            candidates.push(text);
        }
    }
    if !stdout.trim().is_empty() {
        candidates.push(stdout.to_string());
    }
    candidates
}

/// First candidate that yields a schema-valid plan wins.
fn accept_plan(candidates: &[String]) -> Result<Plan, String> {
    let mut reject = String::new();
    for candidate in candidates {
        let Some(payload) = extract_json_payload(candidate) else {
            continue;
        };
        if !payload
            .get("agents")
            .is_some_and(|agents| agents.is_array())
        {
            continue;
        }
        if !PLAN_VALIDATOR.is_valid(&payload) {
            let detail = PLAN_VALIDATOR
                .iter_errors(&payload)
                .map(|err| err.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            reject = format!("plan failed schema validation: {}", snippet(&detail, SNIPPET_LIMIT));
            continue;
        }
        let summary = payload
            .get("mission_summary")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let blueprints: Vec<AgentBlueprint> =
            match serde_json::from_value(payload["agents"].clone()) {
                Ok(blueprints) => blueprints,
                Err(err) => {
                    reject = format!("plan agents failed to deserialize: {err}");
                    continue;
                }
            };
        return Ok(Plan {
            summary,
            blueprints,
        });
    }
    if reject.is_empty() {
        reject = "no candidate contained a JSON plan with an agents array".to_string();
    }
    Err(reject)
}
