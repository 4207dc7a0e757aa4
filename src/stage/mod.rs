/*!
 * Stage Runtime
 * Role-specific loops run by each forked pipeline stage
 */

pub mod relay;
pub mod role;
pub mod runner;
pub mod sink;
pub mod source;
pub mod transform;
pub mod types;

pub use relay::Relay;
pub use role::{adjacent_channels, Role, StageRuntime};
pub use runner::{run_stage, stage_main, Stage, STAGE_EXIT_FAILED, STAGE_EXIT_OK};
pub use sink::Sink;
pub use source::Source;
pub use transform::{expected_after, Doubling, Transform};
pub use types::{LinkSide, StageError, StageResult, StageSummary};
