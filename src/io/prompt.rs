//! Instruction composition for planner and agent invocations.

use anyhow::Result;
use minijinja::{Environment, context};

const PLANNER_TEMPLATE: &str = include_str!("prompts/planner.md");
const AGENT_TEMPLATE: &str = include_str!("prompts/agent.md");

/// Inputs for the planning instruction.
#[derive(Debug, Clone)]
pub struct PlannerPromptInputs<'a> {
    pub goal: &'a str,
    pub context: Option<&'a str>,
    /// Previous attempt's diagnostic, set on retries.
    pub retry_diagnostic: Option<&'a str>,
}

/// Inputs for one agent instruction.
#[derive(Debug, Clone)]
pub struct AgentPromptInputs<'a> {
    pub mission_summary: &'a str,
    pub name: &'a str,
    pub role: &'a str,
    pub expertise: &'a str,
    pub objective: &'a str,
    pub instructions: &'a str,
    /// Include the command-timeout safety block.
    pub needs_timeout_guard: bool,
    /// Prior attempt's failure reason, set on retries.
    pub failure: Option<&'a str>,
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("planner", PLANNER_TEMPLATE)
            .expect("planner template should be valid");
        env.add_template("agent", AGENT_TEMPLATE)
            .expect("agent template should be valid");
        Self { env }
    }

    pub fn render_planner(&self, input: &PlannerPromptInputs<'_>) -> Result<String> {
        let template = self.env.get_template("planner")?;
        let rendered = template.render(context! {
            goal => input.goal.trim(),
            context => input.context.map(str::trim).filter(|s| !s.is_empty()),
            retry_diagnostic => input.retry_diagnostic.map(str::trim).filter(|s| !s.is_empty()),
        })?;
        Ok(rendered)
    }

    pub fn render_agent(&self, input: &AgentPromptInputs<'_>) -> Result<String> {
        let template = self.env.get_template("agent")?;
        let rendered = template.render(context! {
            mission_summary => input.mission_summary.trim(),
            name => input.name,
            role => input.role,
            expertise => input.expertise,
            objective => input.objective,
            instructions => input.instructions,
            needs_timeout_guard => input.needs_timeout_guard,
            failure => input.failure.map(str::trim).filter(|s| !s.is_empty()),
        })?;
        Ok(rendered)
    }
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}
