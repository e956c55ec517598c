//! Mission conductor for an external CLI agent executor.
//!
//! This crate drives a multi-agent "mission" to completion: a planning pass
//! asks the external executor for a list of agent blueprints, then each agent
//! runs sequentially against the executor's line-delimited JSON event stream.
//! After every successful run the agent's reply must carry a trailing control
//! directive that either advances the mission or splices freshly cloned agent
//! instances into the execution queue. The architecture enforces a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (event classification, directive
//!   parsing, safety gating, diagnostics). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (process execution, config,
//!   prompt templating, event logging). Isolated to enable mocking in tests.
//!
//! Orchestration modules ([`plan`], [`mission`]) coordinate core logic with
//! I/O to implement the mission lifecycle.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod mission;
pub mod plan;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
