//! End-to-end mission lifecycle scenarios against a scripted executor.

use conductor::io::config::ConductorConfig;
use conductor::io::process::RunResult;
use conductor::mission::{
    AgentStatus, Mission, MissionEvent, MissionRequest, MissionStatus, run_mission,
};
use conductor::test_support::{ScriptedExecutor, continue_reply, plan_payload, run_result};

fn config() -> ConductorConfig {
    ConductorConfig::default()
}

fn request(goal: &str) -> MissionRequest {
    MissionRequest {
        goal: goal.to_string(),
        context: None,
        cancel: None,
    }
}

fn drive(executor: &ScriptedExecutor) -> (Mission, Vec<MissionEvent>) {
    let mut events = Vec::new();
    let mission = run_mission(executor, &config(), request("ship it"), &mut |event| {
        events.push(event.clone())
    })
    .expect("mission should run");
    (mission, events)
}

fn iteration_reply(directive: &str) -> RunResult {
    run_result(&format!("needs another pass\nCONTROL_JSON: {directive}"))
}

#[test]
fn plan_round_trip_builds_blueprints_and_iteration_zero_agents() {
    let payload = r#"{"mission_summary":"S","agents":[{"name":"a","role":"r","expertise":"e","objective":"o","instructions":"i"}]}"#;
    let executor = ScriptedExecutor::new(vec![
        Ok(run_result(payload)),
        Ok(continue_reply("done")),
    ]);
    let (mission, _) = drive(&executor);

    assert_eq!(mission.status, MissionStatus::Completed);
    assert_eq!(mission.summary.as_deref(), Some("S"));
    assert_eq!(mission.blueprints.len(), 1);
    assert_eq!(mission.blueprints["a"].role, "r");
    assert_eq!(mission.agents.len(), 1);
    assert_eq!(mission.agents[0].id, "a#0");
    assert_eq!(mission.agents[0].iteration, 0);
}

#[test]
fn continue_directive_advances_without_inserting() {
    let executor = ScriptedExecutor::new(vec![
        Ok(run_result(&plan_payload("S", &["builder", "tester"]))),
        Ok(continue_reply("built")),
        Ok(continue_reply("tested")),
    ]);
    let (mission, events) = drive(&executor);

    assert_eq!(mission.status, MissionStatus::Completed);
    assert_eq!(mission.agents.len(), 2);
    assert!(mission
        .agents
        .iter()
        .all(|agent| agent.status == AgentStatus::Completed));
    assert!(!events
        .iter()
        .any(|event| matches!(event, MissionEvent::IterationInserted { .. })));
}

#[test]
fn request_iteration_splices_target_and_follow_up_after_requester() {
    let directive = r#"{"action":"request_iteration","target_agent":"tester","instructions":"fix X","next_agent":"implementer"}"#;
    let executor = ScriptedExecutor::new(vec![
        Ok(run_result(&plan_payload("S", &["implementer", "tester"]))),
        Ok(continue_reply("implemented")),
        Ok(iteration_reply(directive)),
        Ok(continue_reply("retested")),
        Ok(continue_reply("patched")),
    ]);
    let (mission, events) = drive(&executor);

    assert_eq!(mission.status, MissionStatus::Completed);
    let ids: Vec<&str> = mission.agents.iter().map(|agent| agent.id.as_str()).collect();
    assert_eq!(ids, vec!["implementer#0", "tester#0", "tester#1", "implementer#1"]);
    assert!(mission
        .agents
        .iter()
        .all(|agent| agent.status == AgentStatus::Completed));

    let tester_rerun = &mission.agents[2];
    assert!(tester_rerun.instructions.starts_with("fix X"));
    assert_eq!(
        tester_rerun.triggered_by.as_ref().map(|t| t.agent_id.as_str()),
        Some("tester#0")
    );
    let follow_up = &mission.agents[3];
    assert_eq!(
        follow_up.triggered_by.as_ref().map(|t| t.agent_id.as_str()),
        Some("tester#0")
    );

    let inserted: Vec<&Vec<String>> = events
        .iter()
        .filter_map(|event| match event {
            MissionEvent::IterationInserted { inserted, .. } => Some(inserted),
            _ => None,
        })
        .collect();
    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0], &vec!["tester#1".to_string(), "implementer#1".to_string()]);
}

#[test]
fn iteration_request_from_a_failing_run_is_still_honored() {
    // A tester that just watched its suite fail carries failed items in its
    // own event stream; that must not disqualify its iteration request.
    let directive = r#"{"action":"request_iteration","target_agent":"implementer"}"#;
    let mut failing_run = iteration_reply(directive);
    failing_run.events = vec![serde_json::json!({
        "type": "item.completed",
        "item": {"type": "command_execution", "status": "failed"}
    })];
    let executor = ScriptedExecutor::new(vec![
        Ok(run_result(&plan_payload("S", &["implementer", "tester"]))),
        Ok(continue_reply("implemented")),
        Ok(failing_run),
        Ok(continue_reply("patched")),
        Ok(continue_reply("suite green")),
    ]);
    let (mission, events) = drive(&executor);

    assert_eq!(mission.status, MissionStatus::Completed);
    let ids: Vec<&str> = mission.agents.iter().map(|agent| agent.id.as_str()).collect();
    assert_eq!(ids, vec!["implementer#0", "tester#0", "implementer#1", "tester#1"]);
    // The requesting agent finalized in one attempt; nothing was retried.
    assert_eq!(executor.calls(), 5);
    assert!(!events
        .iter()
        .any(|event| matches!(event, MissionEvent::AgentAttemptFailed { .. })));
}

#[test]
fn agents_run_strictly_one_at_a_time() {
    let directive = r#"{"action":"request_iteration","target_agent":"tester","next_agent":"implementer"}"#;
    let executor = ScriptedExecutor::new(vec![
        Ok(run_result(&plan_payload("S", &["implementer", "tester"]))),
        Ok(run_result("no directive, forcing a retry")),
        Ok(continue_reply("implemented")),
        Ok(iteration_reply(directive)),
        Ok(continue_reply("retested")),
        Ok(continue_reply("patched")),
    ]);
    let (mission, events) = drive(&executor);
    assert_eq!(mission.status, MissionStatus::Completed);

    // Every started agent must finish before a different agent starts;
    // repeated starts for the same agent are its retry attempts.
    let mut running: Option<&str> = None;
    for event in &events {
        match event {
            MissionEvent::AgentStarted { agent_id, .. } => {
                assert!(
                    running.is_none() || running == Some(agent_id.as_str()),
                    "{agent_id} started while {} was running",
                    running.unwrap_or_default()
                );
                running = Some(agent_id.as_str());
            }
            MissionEvent::AgentFinished { agent_id, .. } => {
                assert_eq!(running, Some(agent_id.as_str()));
                running = None;
            }
            _ => {}
        }
    }
    assert_eq!(running, None);
}

#[test]
fn exhausted_attempts_fail_agent_and_mission_but_keep_prior_work() {
    let executor = ScriptedExecutor::new(vec![
        Ok(run_result(&plan_payload("S", &["builder", "poller"]))),
        Ok(continue_reply("built")),
        // Three replies without any parseable directive; budget is 3.
        Ok(run_result("I think I'm done?")),
        Ok(run_result("Still no directive")),
        Ok(run_result("Nope")),
    ]);
    let (mission, events) = drive(&executor);

    assert_eq!(mission.status, MissionStatus::Failed);
    assert_eq!(mission.agents[0].status, AgentStatus::Completed);
    assert!(mission.agents[0].result.is_some());
    assert_eq!(mission.agents[1].status, AgentStatus::Failed);
    let error = mission.error.as_deref().expect("error");
    assert!(error.contains("poller#0"));
    assert!(error.contains("after 3 attempts"));

    let failed_attempts = events
        .iter()
        .filter(|event| matches!(event, MissionEvent::AgentAttemptFailed { .. }))
        .count();
    assert_eq!(failed_attempts, 3);
    assert_eq!(executor.calls(), 5);
}

#[test]
fn plan_retry_after_prose_completes_and_records_both_attempts() {
    let executor = ScriptedExecutor::new(vec![
        Ok(run_result("Happy to help! First, some thoughts...")),
        Ok(run_result(&plan_payload("S", &["builder"]))),
        Ok(continue_reply("built")),
    ]);
    let (mission, events) = drive(&executor);

    assert_eq!(mission.status, MissionStatus::Completed);
    let attempts: Vec<bool> = events
        .iter()
        .filter_map(|event| match event {
            MissionEvent::PlanAttempt { failure, .. } => Some(failure.is_some()),
            _ => None,
        })
        .collect();
    assert_eq!(attempts, vec![true, false]);
    assert!(mission
        .log
        .iter()
        .any(|entry| entry.message.contains("plan attempt 1 failed")));
    assert!(mission
        .log
        .iter()
        .any(|entry| entry.message.contains("plan attempt 2 succeeded")));
}

#[test]
fn continue_is_gated_by_execution_error_signals() {
    let mut tainted = continue_reply("all good, promise");
    tainted.events = vec![serde_json::json!({"type": "error", "message": "tool exploded"})];
    let executor = ScriptedExecutor::new(vec![
        Ok(run_result(&plan_payload("S", &["builder"]))),
        Ok(tainted),
        Ok(continue_reply("actually good now")),
    ]);
    let (mission, _) = drive(&executor);

    assert_eq!(mission.status, MissionStatus::Completed);
    // The retry instruction must carry the corrective block.
    let retry = &executor.requests()[2];
    assert!(retry.instruction.contains("Previous attempt failed"));
    assert!(retry.instruction.contains("tool exploded"));
}

#[test]
fn unresolvable_iteration_target_is_retried_not_ignored() {
    let directive = r#"{"action":"request_iteration","target_agent":"ghost"}"#;
    let executor = ScriptedExecutor::new(vec![
        Ok(run_result(&plan_payload("S", &["builder"]))),
        Ok(iteration_reply(directive)),
        Ok(continue_reply("done without the ghost")),
    ]);
    let (mission, _) = drive(&executor);

    assert_eq!(mission.status, MissionStatus::Completed);
    assert_eq!(mission.agents.len(), 1);
    let retry = &executor.requests()[2];
    assert!(retry.instruction.contains("ghost"));
}

#[test]
fn retries_resume_the_agent_thread() {
    let executor = ScriptedExecutor::new(vec![
        Ok(run_result(&plan_payload("S", &["builder"]))),
        Ok(run_result("no directive this time")),
        Ok(continue_reply("done")),
    ]);
    let (mission, _) = drive(&executor);

    assert_eq!(mission.status, MissionStatus::Completed);
    let requests = executor.requests();
    // First agent attempt starts fresh; the retry resumes its thread.
    assert_eq!(requests[1].resume_thread, None);
    assert_eq!(requests[2].resume_thread.as_deref(), Some("thread-0"));
}

#[test]
fn empty_goal_is_rejected_up_front() {
    let executor = ScriptedExecutor::new(vec![]);
    let mut events = Vec::new();
    let result = run_mission(&executor, &config(), request("   "), &mut |event| {
        events.push(event.clone())
    });
    assert!(result.is_err());
    assert!(events.is_empty());
    assert_eq!(executor.calls(), 0);
}

#[test]
fn plan_failure_fails_mission_before_any_agent_runs() {
    let executor = ScriptedExecutor::new(vec![
        Ok(run_result("prose")),
        Ok(run_result("more prose")),
        Ok(run_result("yet more prose")),
    ]);
    let (mission, events) = drive(&executor);

    assert_eq!(mission.status, MissionStatus::Failed);
    assert!(mission.agents.is_empty());
    assert!(mission.error.as_deref().expect("error").contains("after 3 attempts"));
    assert!(events
        .iter()
        .any(|event| matches!(event, MissionEvent::MissionFailed { .. })));
    assert!(!events
        .iter()
        .any(|event| matches!(event, MissionEvent::AgentStarted { .. })));
}
