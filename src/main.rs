//! Command-line entry point for the mission conductor.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;

use conductor::core::diagnostic::{SNIPPET_LIMIT, snippet};
use conductor::exit_codes;
use conductor::io::config::load_config;
use conductor::io::event_log::EventLogWriter;
use conductor::io::executor::CliExecutor;
use conductor::io::prompt::PromptEngine;
use conductor::logging;
use conductor::mission::{Mission, MissionEvent, MissionRequest, MissionStatus, run_mission};
use conductor::plan::{PlanRequest, resolve_plan};

#[derive(Parser)]
#[command(name = "conductor", version, about = "Drive a multi-agent mission through an external CLI executor")]
struct Cli {
    /// Path to the conductor config file.
    #[arg(long, global = true, default_value = "conductor.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan and execute a mission to completion or failure.
    Run {
        /// The goal the mission must achieve.
        #[arg(long)]
        goal: String,
        /// Optional free-form context for the planner and agents.
        #[arg(long)]
        context: Option<String>,
        /// Write a JSONL mission event log to this path.
        #[arg(long)]
        events_out: Option<PathBuf>,
    },
    /// Resolve and print a plan without executing it.
    Plan {
        #[arg(long)]
        goal: String,
        #[arg(long)]
        context: Option<String>,
    },
}

fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();
    match dispatch(&cli) {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            error!(err = ?err, "command failed");
            eprintln!("error: {err:#}");
            ExitCode::from(exit_codes::INVALID as u8)
        }
    }
}

fn dispatch(cli: &Cli) -> Result<i32> {
    let config = load_config(&cli.config)?;
    match &cli.command {
        Command::Run {
            goal,
            context,
            events_out,
        } => cmd_run(&config, goal, context.as_deref(), events_out.as_deref()),
        Command::Plan { goal, context } => cmd_plan(&config, goal, context.as_deref()),
    }
}

fn cmd_run(
    config: &conductor::io::config::ConductorConfig,
    goal: &str,
    context: Option<&str>,
    events_out: Option<&std::path::Path>,
) -> Result<i32> {
    let executor = CliExecutor::from_config(config);
    let mut event_log = match events_out {
        Some(path) => Some(EventLogWriter::create(path)?),
        None => None,
    };

    let request = MissionRequest {
        goal: goal.to_string(),
        context: context.map(str::to_string),
        cancel: None,
    };
    let mission = run_mission(&executor, config, request, &mut |event: &MissionEvent| {
        if let Some(log) = event_log.as_mut()
            && let Err(err) = log.append(event)
        {
            error!(err = ?err, "failed to append mission event");
        }
    })?;

    println!(
        "{}",
        serde_json::to_string_pretty(&mission).context("serialize mission")?
    );
    Ok(run_exit_code(&mission))
}

fn run_exit_code(mission: &Mission) -> i32 {
    match mission.status {
        MissionStatus::Completed => exit_codes::OK,
        // An empty queue means planning never produced agents.
        MissionStatus::Failed if mission.agents.is_empty() => exit_codes::PLAN_FAILED,
        _ => exit_codes::MISSION_FAILED,
    }
}

fn cmd_plan(
    config: &conductor::io::config::ConductorConfig,
    goal: &str,
    context: Option<&str>,
) -> Result<i32> {
    let executor = CliExecutor::from_config(config);
    let request = PlanRequest {
        goal: goal.to_string(),
        context: context.map(str::to_string),
        cancel: None,
    };
    let plan = resolve_plan(
        &executor,
        &PromptEngine::new(),
        &request,
        config.plan_attempts,
        Duration::from_secs(config.run_timeout_secs),
        &mut |record| {
            if let Some(failure) = &record.failure {
                eprintln!(
                    "plan attempt {} failed: {}",
                    record.attempt,
                    snippet(failure, SNIPPET_LIMIT)
                );
            }
        },
    );
    match plan {
        Ok(plan) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&plan.blueprints).context("serialize plan")?
            );
            Ok(exit_codes::OK)
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            Ok(exit_codes::PLAN_FAILED)
        }
    }
}
