//! Pure, deterministic logic for the conductor.
//!
//! These modules define stable contracts between the orchestration layers.
//! They must not perform I/O and must remain deterministic across runs.

pub mod diagnostic;
pub mod directive;
pub mod events;
pub mod safety;
