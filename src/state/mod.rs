//! State module for tracking run progress
//!
//! # Components
//!
//! - `RunPhase`: lifecycle of a run (idle, running, draining, finished)
//! - `StopReason`: why a run stopped accepting work
//! - `RunState`: the shared quota and stop controller consulted by every worker

mod run_phase;
mod run_state;

// Re-export main types
pub use run_phase::{RunPhase, StopReason};
pub use run_state::{RunCounters, RunState};
