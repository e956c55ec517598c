//! Side-effecting operations: process execution, config, templating, logging.

pub mod config;
pub mod event_log;
pub mod executor;
pub mod process;
pub mod prompt;
