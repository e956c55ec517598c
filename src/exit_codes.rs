//! Stable exit codes for conductor CLI commands.

/// Command succeeded and the mission completed.
pub const OK: i32 = 0;
/// Command failed due to invalid arguments, config, or other errors.
pub const INVALID: i32 = 1;
/// The mission planned successfully but execution failed.
pub const MISSION_FAILED: i32 = 2;
/// Planning never produced a usable agent list.
pub const PLAN_FAILED: i32 = 3;
