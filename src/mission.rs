//! Mission lifecycle: planning, sequential agent execution, iteration
//! splicing, and terminal completion or failure.
//!
//! A mission owns a growable agent queue iterated by an index cursor. Agents
//! execute strictly sequentially; after each successful run the trailing
//! control directive decides whether to advance or to splice freshly cloned
//! agent instances immediately after the cursor. All state lives in the
//! returned [`Mission`] record; observers receive ordered [`MissionEvent`]s
//! as the lifecycle advances.

use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::core::diagnostic::{SNIPPET_LIMIT, compose_diagnostic, snippet};
use crate::core::directive::{DirectiveOutcome, IterationRequest, parse_directive};
use crate::core::events::{Usage, scan_execution_errors};
use crate::core::safety::needs_command_timeouts;
use crate::io::config::ConductorConfig;
use crate::io::executor::{ExecRequest, Executor};
use crate::io::process::{CancelFlag, RunResult};
use crate::io::prompt::{AgentPromptInputs, PromptEngine};
use crate::plan::{AgentBlueprint, PlanRequest, resolve_plan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    Planning,
    Executing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Structured outcome captured when an agent finishes successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResult {
    pub final_message: Option<String>,
    pub usage: Option<Usage>,
    /// Completion type tag observed on the run's event stream.
    pub completion: Option<String>,
    /// Echo of the executed argv (instruction excluded).
    pub command: Vec<String>,
}

/// Back-reference from an iteration-inserted agent to its requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggeredBy {
    pub agent_id: String,
    pub reason: Option<String>,
}

/// Timestamped append-only log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

impl LogEntry {
    fn now(message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            message: message.into(),
        }
    }
}

/// One scheduled execution of a blueprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// `{base_name}#{iteration}`; unique within a mission.
    pub id: String,
    pub base_name: String,
    pub iteration: u32,
    pub status: AgentStatus,
    /// Effective instructions for this instance (override text, if any,
    /// stacked above the blueprint's).
    pub instructions: String,
    pub result: Option<AgentResult>,
    /// Executor thread identifier, reused to resume on retries.
    pub thread_id: Option<String>,
    pub log: Vec<LogEntry>,
    pub triggered_by: Option<TriggeredBy>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Agent {
    fn from_blueprint(
        blueprint: &AgentBlueprint,
        iteration: u32,
        instructions: String,
        triggered_by: Option<TriggeredBy>,
    ) -> Self {
        Self {
            id: format!("{}#{iteration}", blueprint.name),
            base_name: blueprint.name.clone(),
            iteration,
            status: AgentStatus::Pending,
            instructions,
            result: None,
            thread_id: None,
            log: Vec::new(),
            triggered_by,
            started_at: None,
            finished_at: None,
        }
    }
}

/// One end-to-end run of a goal through planning and agent execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    pub id: String,
    pub goal: String,
    pub context: Option<String>,
    pub status: MissionStatus,
    pub summary: Option<String>,
    pub agents: Vec<Agent>,
    /// Base-name to blueprint mapping, the template source for iterations.
    pub blueprints: BTreeMap<String, AgentBlueprint>,
    pub log: Vec<LogEntry>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mission {
    fn new(goal: String, context: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            goal,
            context,
            status: MissionStatus::Planning,
            summary: None,
            agents: Vec::new(),
            blueprints: BTreeMap::new(),
            log: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn record(&mut self, message: impl Into<String>) {
        self.log.push(LogEntry::now(message));
        self.updated_at = Utc::now();
    }

    /// Lightweight listing view.
    pub fn projection(&self) -> MissionProjection {
        MissionProjection {
            id: self.id.clone(),
            goal: self.goal.clone(),
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            agent_count: self.agents.len(),
            summary: self.summary.clone(),
        }
    }
}

/// Listing projection of a mission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionProjection {
    pub id: String,
    pub goal: String,
    pub status: MissionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub agent_count: usize,
    pub summary: Option<String>,
}

/// Ordered lifecycle events emitted while a mission runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MissionEvent {
    MissionCreated {
        mission_id: String,
        goal: String,
    },
    MissionPlanning {
        mission_id: String,
    },
    PlanAttempt {
        mission_id: String,
        attempt: u32,
        failure: Option<String>,
    },
    MissionPlanned {
        mission_id: String,
        summary: Option<String>,
        agent_count: usize,
    },
    MissionExecuting {
        mission_id: String,
    },
    AgentStarted {
        mission_id: String,
        agent_id: String,
        attempt: u32,
    },
    AgentAttemptFailed {
        mission_id: String,
        agent_id: String,
        attempt: u32,
        reason: String,
    },
    IterationInserted {
        mission_id: String,
        requested_by: String,
        inserted: Vec<String>,
        reason: Option<String>,
    },
    AgentFinished {
        mission_id: String,
        agent_id: String,
        status: AgentStatus,
    },
    MissionCompleted {
        mission_id: String,
    },
    MissionFailed {
        mission_id: String,
        error: String,
    },
}

/// Inputs for one mission.
#[derive(Debug, Clone)]
pub struct MissionRequest {
    pub goal: String,
    pub context: Option<String>,
    pub cancel: Option<CancelFlag>,
}

/// Run a mission to a terminal state.
///
/// Returns an error only for invalid input (an empty goal); every runtime
/// failure is reported through the returned mission's `failed` status and
/// error string instead, with all completed work retained.
#[instrument(skip_all, fields(goal_len = request.goal.len()))]
pub fn run_mission<E, F>(
    executor: &E,
    config: &ConductorConfig,
    request: MissionRequest,
    observer: &mut F,
) -> Result<Mission>
where
    E: Executor,
    F: FnMut(&MissionEvent),
{
    let goal = request.goal.trim().to_string();
    if goal.is_empty() {
        return Err(anyhow!("mission goal must not be empty"));
    }

    let prompts = PromptEngine::new();
    let mut mission = Mission::new(goal, request.context.clone());
    observer(&MissionEvent::MissionCreated {
        mission_id: mission.id.clone(),
        goal: mission.goal.clone(),
    });
    mission.record("mission created");
    info!(mission_id = %mission.id, "mission created");

    observer(&MissionEvent::MissionPlanning {
        mission_id: mission.id.clone(),
    });
    mission.record("planning started");

    let plan_request = PlanRequest {
        goal: mission.goal.clone(),
        context: mission.context.clone(),
        cancel: request.cancel.clone(),
    };
    let mission_id = mission.id.clone();
    let mut attempt_log = Vec::new();
    let plan = resolve_plan(
        executor,
        &prompts,
        &plan_request,
        config.plan_attempts,
        config.run_timeout(),
        &mut |record| {
            observer(&MissionEvent::PlanAttempt {
                mission_id: mission_id.clone(),
                attempt: record.attempt,
                failure: record.failure.clone(),
            });
            attempt_log.push(match &record.failure {
                Some(failure) => format!("plan attempt {} failed: {failure}", record.attempt),
                None => format!("plan attempt {} succeeded", record.attempt),
            });
        },
    );
    for entry in attempt_log {
        mission.record(entry);
    }

    let plan = match plan {
        Ok(plan) => plan,
        Err(err) => {
            let error = format!("{err:#}");
            warn!(mission_id = %mission.id, error = %error, "planning failed");
            fail_mission(&mut mission, error, observer);
            return Ok(mission);
        }
    };

    mission.summary = plan.summary.clone();
    for blueprint in &plan.blueprints {
        mission
            .blueprints
            .insert(blueprint.name.clone(), blueprint.clone());
        mission.agents.push(Agent::from_blueprint(
            blueprint,
            0,
            blueprint.instructions.clone(),
            None,
        ));
    }
    mission.record(format!("planned {} agents", mission.agents.len()));
    observer(&MissionEvent::MissionPlanned {
        mission_id: mission.id.clone(),
        summary: mission.summary.clone(),
        agent_count: mission.agents.len(),
    });

    mission.status = MissionStatus::Executing;
    observer(&MissionEvent::MissionExecuting {
        mission_id: mission.id.clone(),
    });

    let mut index = 0;
    while index < mission.agents.len() {
        // The queue may have grown behind us; never reprocess finished work.
        if mission.agents[index].status == AgentStatus::Completed {
            index += 1;
            continue;
        }
        if !run_agent(
            executor,
            config,
            &prompts,
            &mut mission,
            index,
            request.cancel.as_ref(),
            observer,
        ) {
            return Ok(mission);
        }
        index += 1;
    }

    mission.status = MissionStatus::Completed;
    mission.record("mission completed");
    info!(mission_id = %mission.id, agents = mission.agents.len(), "mission completed");
    observer(&MissionEvent::MissionCompleted {
        mission_id: mission.id.clone(),
    });
    Ok(mission)
}

fn fail_mission<F>(mission: &mut Mission, error: String, observer: &mut F)
where
    F: FnMut(&MissionEvent),
{
    mission.status = MissionStatus::Failed;
    mission.error = Some(error.clone());
    mission.record(format!("mission failed: {error}"));
    observer(&MissionEvent::MissionFailed {
        mission_id: mission.id.clone(),
        error,
    });
}

/// Execute the agent at `index` within its attempt budget.
///
/// Returns `true` when the mission should keep executing; `false` after the
/// mission has been marked failed.
fn run_agent<E, F>(
    executor: &E,
    config: &ConductorConfig,
    prompts: &PromptEngine,
    mission: &mut Mission,
    index: usize,
    cancel: Option<&CancelFlag>,
    observer: &mut F,
) -> bool
where
    E: Executor,
    F: FnMut(&MissionEvent),
{
    let agent_id = mission.agents[index].id.clone();
    let base_name = mission.agents[index].base_name.clone();
    let Some(blueprint) = mission.blueprints.get(&base_name).cloned() else {
        // Unreachable for agents built from the blueprint map, kept as a
        // guard against queue corruption.
        let error = format!("agent {agent_id} references unknown blueprint {base_name}");
        finalize_failed_agent(mission, index, &error, observer);
        return false;
    };

    let safety_fields = format!(
        "{} {} {} {}",
        blueprint.role, blueprint.objective, mission.agents[index].instructions, base_name
    );
    let needs_timeout_guard = needs_command_timeouts(&safety_fields);
    let mission_summary = mission
        .summary
        .clone()
        .unwrap_or_else(|| mission.goal.clone());

    let mut last_failure: Option<String> = None;
    for attempt in 1..=config.max_attempts.max(1) {
        {
            let agent = &mut mission.agents[index];
            agent.status = AgentStatus::Running;
            if agent.started_at.is_none() {
                agent.started_at = Some(Utc::now());
            }
            agent.log.push(LogEntry::now(format!("attempt {attempt} started")));
        }
        observer(&MissionEvent::AgentStarted {
            mission_id: mission.id.clone(),
            agent_id: agent_id.clone(),
            attempt,
        });
        debug!(agent_id = %agent_id, attempt, "agent attempt started");

        let failure = match run_attempt(
            executor,
            config,
            prompts,
            mission,
            index,
            &blueprint,
            &mission_summary,
            needs_timeout_guard,
            last_failure.as_deref(),
            cancel,
            observer,
        ) {
            Ok(()) => {
                let agent = &mut mission.agents[index];
                agent.status = AgentStatus::Completed;
                agent.finished_at = Some(Utc::now());
                agent.log.push(LogEntry::now(format!("attempt {attempt} completed")));
                mission.record(format!("agent {agent_id} completed"));
                observer(&MissionEvent::AgentFinished {
                    mission_id: mission.id.clone(),
                    agent_id: agent_id.clone(),
                    status: AgentStatus::Completed,
                });
                return true;
            }
            Err(failure) => failure,
        };

        warn!(agent_id = %agent_id, attempt, failure = %failure, "agent attempt failed");
        mission.agents[index]
            .log
            .push(LogEntry::now(format!("attempt {attempt} failed: {failure}")));
        observer(&MissionEvent::AgentAttemptFailed {
            mission_id: mission.id.clone(),
            agent_id: agent_id.clone(),
            attempt,
            reason: failure.clone(),
        });
        last_failure = Some(failure);
    }

    let error = format!(
        "agent {agent_id} failed after {} attempts: {}",
        config.max_attempts.max(1),
        last_failure.unwrap_or_else(|| "no failure recorded".to_string())
    );
    finalize_failed_agent(mission, index, &error, observer);
    false
}

fn finalize_failed_agent<F>(mission: &mut Mission, index: usize, error: &str, observer: &mut F)
where
    F: FnMut(&MissionEvent),
{
    let agent_id = {
        let agent = &mut mission.agents[index];
        agent.status = AgentStatus::Failed;
        agent.finished_at = Some(Utc::now());
        agent.id.clone()
    };
    observer(&MissionEvent::AgentFinished {
        mission_id: mission.id.clone(),
        agent_id,
        status: AgentStatus::Failed,
    });
    fail_mission(mission, error.to_string(), observer);
}

/// One executor round-trip for the agent at `index`.
///
/// `Ok(())` means the agent is done for this queue slot (any requested
/// iterations have been spliced in); `Err` carries the retryable failure
/// reason for the next attempt's corrective block.
#[allow(clippy::too_many_arguments)]
fn run_attempt<E, F>(
    executor: &E,
    config: &ConductorConfig,
    prompts: &PromptEngine,
    mission: &mut Mission,
    index: usize,
    blueprint: &AgentBlueprint,
    mission_summary: &str,
    needs_timeout_guard: bool,
    last_failure: Option<&str>,
    cancel: Option<&CancelFlag>,
    observer: &mut F,
) -> Result<(), String>
where
    E: Executor,
    F: FnMut(&MissionEvent),
{
    let instruction = prompts
        .render_agent(&AgentPromptInputs {
            mission_summary,
            name: &mission.agents[index].id,
            role: &blueprint.role,
            expertise: &blueprint.expertise,
            objective: &blueprint.objective,
            instructions: &mission.agents[index].instructions,
            needs_timeout_guard,
            failure: last_failure,
        })
        .map_err(|err| format!("failed to compose agent instruction: {err:#}"))?;

    let exec_request = ExecRequest {
        resume_thread: mission.agents[index].thread_id.clone(),
        cancel: cancel.cloned(),
        ..ExecRequest::new(instruction, config.run_timeout())
    };
    let run = executor
        .run(&exec_request)
        .map_err(|err| format!("executor failed to run: {err:#}"))?;

    if let Some(thread_id) = &run.thread_id {
        mission.agents[index].thread_id = Some(thread_id.clone());
    }

    if run.timed_out {
        return Err(format!(
            "run timed out after {}s",
            config.run_timeout_secs
        ));
    }
    if run.aborted {
        return Err("run was cancelled".to_string());
    }
    if !run.is_success() {
        let fallback = run
            .final_message
            .as_deref()
            .unwrap_or(run.stdout.as_str());
        return Err(compose_diagnostic(
            run.effective_exit_code(),
            &run.stderr,
            fallback,
        ));
    }

    let reply = run.final_message.as_deref().unwrap_or(run.stdout.as_str());
    match parse_directive(reply) {
        DirectiveOutcome::Missing => {
            Err("reply carried no parseable control directive".to_string())
        }
        DirectiveOutcome::Unsupported { action } => Err(format!(
            "unsupported directive action '{}'",
            action.as_deref().unwrap_or("<none>")
        )),
        DirectiveOutcome::Continue => {
            let errors = scan_execution_errors(&run.events, &run.stderr);
            if !errors.is_empty() {
                return Err(format!(
                    "directive said continue but the run reported errors: {}",
                    snippet(&errors.join("; "), SNIPPET_LIMIT)
                ));
            }
            capture_result(mission, index, &run);
            Ok(())
        }
        DirectiveOutcome::RequestIteration(iteration) => {
            // No execution-error gate here: a failing run is the normal
            // trigger for an iteration request, and the error signals it
            // carries are what the re-run is meant to address.
            let inserted = plan_insertions(mission, index, &iteration)?;
            capture_result(mission, index, &run);
            let inserted_ids: Vec<String> =
                inserted.iter().map(|agent| agent.id.clone()).collect();
            for (offset, agent) in inserted.into_iter().enumerate() {
                mission.agents.insert(index + 1 + offset, agent);
            }
            let requester = mission.agents[index].id.clone();
            mission.record(format!(
                "agent {requester} requested iteration; inserted [{}]",
                inserted_ids.join(", ")
            ));
            observer(&MissionEvent::IterationInserted {
                mission_id: mission.id.clone(),
                requested_by: requester,
                inserted: inserted_ids,
                reason: iteration.reason.clone(),
            });
            Ok(())
        }
    }
}

fn capture_result(mission: &mut Mission, index: usize, run: &RunResult) {
    mission.agents[index].result = Some(AgentResult {
        final_message: run.final_message.clone(),
        usage: run.usage.clone(),
        completion: run.completion.clone(),
        command: run.command.clone(),
    });
}

/// Strip a trailing `#<digits>` iteration suffix, if present.
fn base_name(name: &str) -> &str {
    if let Some((base, suffix)) = name.rsplit_once('#')
        && !base.is_empty()
        && !suffix.is_empty()
        && suffix.chars().all(|c| c.is_ascii_digit())
    {
        return base;
    }
    name
}

/// Resolve a directive-supplied agent name to a registered blueprint.
fn resolve_blueprint<'m>(mission: &'m Mission, name: &str) -> Option<&'m AgentBlueprint> {
    let trimmed = name.trim();
    mission
        .blueprints
        .get(trimmed)
        .or_else(|| mission.blueprints.get(base_name(trimmed)))
}

/// Build the agent instances a `request_iteration` directive asks for.
///
/// An unresolvable target is a retryable failure for the current attempt,
/// never a silent no-op. The follow-up clone is appended only when its base
/// name resolves and differs from the target's.
fn plan_insertions(
    mission: &Mission,
    requester_index: usize,
    request: &IterationRequest,
) -> Result<Vec<Agent>, String> {
    let requester = &mission.agents[requester_index];
    let target_name = request
        .target_agent
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(&requester.base_name);
    let Some(target) = resolve_blueprint(mission, target_name) else {
        return Err(format!(
            "iteration target '{target_name}' does not match any planned agent"
        ));
    };

    let triggered_by = TriggeredBy {
        agent_id: requester.id.clone(),
        reason: request.reason.clone(),
    };
    let mut inserted = Vec::new();
    inserted.push(Agent::from_blueprint(
        target,
        next_iteration(mission, &target.name),
        stacked_instructions(request.instructions.as_deref(), &target.instructions),
        Some(triggered_by.clone()),
    ));

    let follow_name = request
        .next_agent
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(&requester.base_name);
    if let Some(follow) = resolve_blueprint(mission, follow_name)
        && follow.name != target.name
    {
        inserted.push(Agent::from_blueprint(
            follow,
            next_iteration(mission, &follow.name),
            stacked_instructions(request.next_instructions.as_deref(), &follow.instructions),
            Some(triggered_by),
        ));
    }
    Ok(inserted)
}

/// Next free iteration counter for `base`: the count of existing instances.
fn next_iteration(mission: &Mission, base: &str) -> u32 {
    mission
        .agents
        .iter()
        .filter(|agent| agent.base_name == base)
        .count() as u32
}

/// Override text stacks above the original instructions, never replaces them.
fn stacked_instructions(override_text: Option<&str>, original: &str) -> String {
    match override_text.map(str::trim).filter(|text| !text.is_empty()) {
        Some(text) => format!("{text}\n\n---\n\n{original}"),
        None => original.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::blueprint;

    fn mission_with(blueprints: &[&str]) -> Mission {
        let mut mission = Mission::new("goal".to_string(), None);
        for name in blueprints {
            let bp = blueprint(name);
            mission.agents.push(Agent::from_blueprint(
                &bp,
                0,
                bp.instructions.clone(),
                None,
            ));
            mission.blueprints.insert((*name).to_string(), bp);
        }
        mission
    }

    #[test]
    fn base_name_strips_numeric_suffix_only() {
        assert_eq!(base_name("tester#2"), "tester");
        assert_eq!(base_name("tester"), "tester");
        assert_eq!(base_name("c#-runner"), "c#-runner");
        assert_eq!(base_name("#3"), "#3");
    }

    #[test]
    fn resolve_blueprint_accepts_iteration_suffixed_names() {
        let mission = mission_with(&["tester"]);
        assert!(resolve_blueprint(&mission, "tester").is_some());
        assert!(resolve_blueprint(&mission, "tester#4").is_some());
        assert!(resolve_blueprint(&mission, " tester ").is_some());
        assert!(resolve_blueprint(&mission, "ghost").is_none());
    }

    #[test]
    fn insertions_default_to_requester_and_skip_same_base_follow_up() {
        let mission = mission_with(&["tester"]);
        let inserted = plan_insertions(&mission, 0, &IterationRequest::default()).expect("plan");
        // Target and implied follow-up share the requester's base; only one
        // instance is inserted.
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].id, "tester#1");
        assert_eq!(inserted[0].status, AgentStatus::Pending);
        assert_eq!(
            inserted[0].triggered_by.as_ref().map(|t| t.agent_id.as_str()),
            Some("tester#0")
        );
    }

    #[test]
    fn insertions_carry_target_and_distinct_follow_up() {
        let mission = mission_with(&["implementer", "tester"]);
        let request = IterationRequest {
            target_agent: Some("tester".to_string()),
            instructions: Some("fix X".to_string()),
            reason: Some("failing suite".to_string()),
            next_agent: Some("implementer".to_string()),
            next_instructions: None,
        };
        let inserted = plan_insertions(&mission, 1, &request).expect("plan");
        assert_eq!(inserted.len(), 2);
        assert_eq!(inserted[0].id, "tester#1");
        assert!(inserted[0].instructions.starts_with("fix X\n\n---\n\n"));
        assert!(inserted[0].instructions.ends_with("tester instructions"));
        assert_eq!(inserted[1].id, "implementer#1");
        assert_eq!(inserted[1].instructions, "implementer instructions");
        assert_eq!(
            inserted[0].triggered_by.as_ref().and_then(|t| t.reason.as_deref()),
            Some("failing suite")
        );
    }

    #[test]
    fn unresolvable_target_is_an_error() {
        let mission = mission_with(&["tester"]);
        let request = IterationRequest {
            target_agent: Some("ghost".to_string()),
            ..IterationRequest::default()
        };
        let err = plan_insertions(&mission, 0, &request).expect_err("must fail");
        assert!(err.contains("ghost"));
    }

    #[test]
    fn iteration_counters_count_existing_instances() {
        let mut mission = mission_with(&["tester"]);
        let bp = mission.blueprints["tester"].clone();
        mission
            .agents
            .push(Agent::from_blueprint(&bp, 1, bp.instructions.clone(), None));
        assert_eq!(next_iteration(&mission, "tester"), 2);
        assert_eq!(next_iteration(&mission, "other"), 0);
    }

    #[test]
    fn projection_reflects_queue_size_and_summary() {
        let mut mission = mission_with(&["a", "b"]);
        mission.summary = Some("S".to_string());
        let projection = mission.projection();
        assert_eq!(projection.agent_count, 2);
        assert_eq!(projection.summary.as_deref(), Some("S"));
        assert_eq!(projection.status, MissionStatus::Planning);
    }
}
