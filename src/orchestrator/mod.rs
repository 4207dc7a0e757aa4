/*!
 * Orchestrator Module
 * Parent-side lifecycle of a pipeline run
 */

pub mod pipeline;
pub mod process;
pub mod resources;
pub mod types;

pub use pipeline::Orchestrator;
pub use process::{join_stage, kill_stages, spawn_stage};
pub use resources::PipelineResources;
pub use types::{
    failures, OrchestratorError, OrchestratorResult, RunSummary, StageExit, StageOutcome,
};
