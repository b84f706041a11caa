//! Test harness
//!
//! - `MemoryTaskApi`: in-process `TaskApi` with latency and fault injection
//! - Scenario runner: replays the reference flows and reports what a view
//!   would have observed

mod memory;
mod scenario;

pub use memory::{ApiOp, MemoryTaskApi};
pub use scenario::{
    run_all, run_scenarios, ScenarioConfig, ScenarioKind, ScenarioReport, ScenarioResult,
};
