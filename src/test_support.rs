//! Scripted doubles and fixture builders for tests.
//!
//! Available to integration tests through the `test-support` feature.

use std::cell::RefCell;
use std::collections::VecDeque;

use anyhow::{Result, anyhow};

use crate::io::executor::{ExecRequest, Executor};
use crate::io::process::RunResult;
use crate::plan::AgentBlueprint;

/// Executor double replaying a fixed script of run outcomes.
///
/// Each call consumes the next scripted entry; running past the end of the
/// script is a test bug and panics. Requests are captured for assertions.
pub struct ScriptedExecutor {
    script: RefCell<VecDeque<Result<RunResult, String>>>,
    requests: RefCell<Vec<ExecRequest>>,
}

impl ScriptedExecutor {
    pub fn new(script: Vec<Result<RunResult, String>>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Requests observed so far, in call order.
    pub fn requests(&self) -> Vec<ExecRequest> {
        self.requests.borrow().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl Executor for ScriptedExecutor {
    fn run(&self, request: &ExecRequest) -> Result<RunResult> {
        self.requests.borrow_mut().push(request.clone());
        let entry = self
            .script
            .borrow_mut()
            .pop_front()
            .expect("scripted executor ran past its script");
        entry.map_err(|message| anyhow!(message))
    }
}

/// A clean successful run whose final message is `message`.
pub fn run_result(message: &str) -> RunResult {
    RunResult {
        command: vec!["scripted".to_string()],
        exit_code: Some(0),
        signal: None,
        stdout: String::new(),
        stderr: String::new(),
        events: Vec::new(),
        thread_id: Some("thread-0".to_string()),
        turn_id: Some("turn-0".to_string()),
        final_message: Some(message.to_string()),
        usage: None,
        completion: Some("turn.completed".to_string()),
        killed_after_completion: false,
        timed_out: false,
        aborted: false,
        anomalies: 0,
    }
}

/// An agent reply that ends with a `continue` directive.
pub fn continue_reply(body: &str) -> RunResult {
    run_result(&format!("{body}\nCONTROL_JSON: {{\"action\": \"continue\"}}"))
}

/// A planning payload with one fully populated blueprint per name.
pub fn plan_payload(summary: &str, names: &[&str]) -> String {
    let agents: Vec<serde_json::Value> = names
        .iter()
        .map(|name| {
            serde_json::json!({
                "name": name,
                "role": format!("{name} role"),
                "expertise": format!("{name} expertise"),
                "objective": format!("{name} objective"),
                "instructions": format!("{name} instructions"),
            })
        })
        .collect();
    serde_json::json!({
        "mission_summary": summary,
        "agents": agents,
    })
    .to_string()
}

/// A fully populated blueprint for `name`.
pub fn blueprint(name: &str) -> AgentBlueprint {
    AgentBlueprint {
        name: name.to_string(),
        role: format!("{name} role"),
        expertise: format!("{name} expertise"),
        objective: format!("{name} objective"),
        instructions: format!("{name} instructions"),
    }
}
