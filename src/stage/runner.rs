/*!
 * Stage Runner
 * INIT -> RUNNING -> DONE state machine and the child process entry point
 */

use super::relay::Relay;
use super::role::{Role, StageRuntime};
use super::sink::Sink;
use super::source::Source;
use super::transform::Transform;
use super::types::{LinkSide, StageError, StageResult, StageSummary};
use crate::config::PipelineConfig;
use crate::core::types::{Iteration, Position};
use crate::ipc::{Link, StageLinks};
use crate::monitoring::TimestampRecorder;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Exit status of a stage that reached DONE
pub const STAGE_EXIT_OK: i32 = 0;
/// Exit status of a stage that hit any error
pub const STAGE_EXIT_FAILED: i32 = 1;

/// A stage with its role chosen once, at INIT
#[derive(Debug)]
pub enum Stage<W: Write = BufWriter<File>> {
    Source(Source<W>),
    Relay(Relay<W>),
    Sink(Sink<W>),
}

fn require(link: Option<Link>, position: Position, side: LinkSide) -> StageResult<Link> {
    link.ok_or(StageError::MissingLink { position, side })
}

impl<W: Write> Stage<W> {
    /// INIT: open the adjacent semaphores and allocate private memory
    pub fn init(
        config: &PipelineConfig,
        position: Position,
        links: StageLinks,
        transform: Arc<dyn Transform>,
        recorder: TimestampRecorder<W>,
    ) -> StageResult<Self> {
        let StageLinks {
            upstream,
            downstream,
        } = links;

        let stage = match Role::for_position(position, config.nodes) {
            Role::Source => Stage::Source(Source::init(
                config,
                position,
                require(downstream, position, LinkSide::Downstream)?,
                recorder,
            )?),
            Role::Relay => Stage::Relay(Relay::init(
                config,
                position,
                require(upstream, position, LinkSide::Upstream)?,
                require(downstream, position, LinkSide::Downstream)?,
                transform,
                recorder,
            )?),
            Role::Sink => Stage::Sink(Sink::init(
                config,
                position,
                require(upstream, position, LinkSide::Upstream)?,
                transform.as_ref(),
                recorder,
            )?),
        };
        Ok(stage)
    }
}

impl<W: Write> StageRuntime for Stage<W> {
    fn position(&self) -> Position {
        match self {
            Stage::Source(s) => s.position(),
            Stage::Relay(s) => s.position(),
            Stage::Sink(s) => s.position(),
        }
    }

    fn role(&self) -> Role {
        match self {
            Stage::Source(_) => Role::Source,
            Stage::Relay(_) => Role::Relay,
            Stage::Sink(_) => Role::Sink,
        }
    }

    fn run_iteration(&mut self, iteration: Iteration) -> StageResult<()> {
        match self {
            Stage::Source(s) => s.run_iteration(iteration),
            Stage::Relay(s) => s.run_iteration(iteration),
            Stage::Sink(s) => s.run_iteration(iteration),
        }
    }

    fn finish(self) -> StageResult<StageSummary> {
        match self {
            Stage::Source(s) => s.finish(),
            Stage::Relay(s) => s.finish(),
            Stage::Sink(s) => s.finish(),
        }
    }
}

/// Run one stage to completion in the current process
pub fn run_stage(
    position: Position,
    config: &PipelineConfig,
    links: StageLinks,
    transform: Arc<dyn Transform>,
) -> StageResult<StageSummary> {
    let recorder = TimestampRecorder::open(&config.stage_log_path(position), position)?;
    let mut stage = Stage::init(config, position, links, transform, recorder)?;
    info!(position, role = %stage.role(), pid = std::process::id(), "Stage running");

    for iteration in 0..config.iterations {
        stage.run_iteration(iteration)?;
    }

    stage.finish()
}

/// Entry point of a forked stage; returns the process exit status
pub fn stage_main(
    position: Position,
    config: &PipelineConfig,
    links: StageLinks,
    transform: Arc<dyn Transform>,
) -> i32 {
    match run_stage(position, config, links, transform) {
        Ok(summary) => {
            if summary.hints_rejected > 0 {
                warn!(
                    position,
                    rejected = summary.hints_rejected,
                    applied = summary.hints_applied,
                    "Some eviction hints were rejected"
                );
            }
            info!(
                position,
                role = %summary.role,
                iterations = summary.iterations,
                records = summary.records,
                hints_applied = summary.hints_applied,
                "Stage done"
            );
            STAGE_EXIT_OK
        }
        Err(e) => {
            error!(position, error = %e, "Stage failed");
            STAGE_EXIT_FAILED
        }
    }
}
