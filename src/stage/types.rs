/*!
 * Stage Types
 * Errors and end-of-run summary for a single pipeline stage
 */

use super::role::Role;
use crate::core::types::{Iteration, Position, Word};
use crate::ipc::IpcError;
use crate::memory::MemoryError;
use crate::monitoring::RecorderError;
use miette::Diagnostic;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Stage operation result
pub type StageResult<T> = Result<T, StageError>;

/// Which neighbor a link points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSide {
    Upstream,
    Downstream,
}

impl fmt::Display for LinkSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkSide::Upstream => f.write_str("upstream"),
            LinkSide::Downstream => f.write_str("downstream"),
        }
    }
}

/// Stage errors; any of them terminates the stage process
#[derive(Error, Debug, Diagnostic)]
pub enum StageError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Ipc(#[from] IpcError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Recorder(#[from] RecorderError),

    #[error("Stage {position} has no {side} channel")]
    #[diagnostic(
        code(stage::missing_link),
        help("Every stage except the Source reads upstream; every stage except the Sink writes downstream.")
    )]
    MissingLink { position: Position, side: LinkSide },

    #[error("Payload mismatch at iteration {iteration}, slot {slot}: expected {expected}, got {actual}")]
    #[diagnostic(
        code(stage::payload_mismatch),
        help("A hand-off delivered a partially written or stale message.")
    )]
    PayloadMismatch {
        iteration: Iteration,
        slot: usize,
        expected: Word,
        actual: Word,
    },
}

/// What a stage reports when it reaches DONE
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageSummary {
    pub position: Position,
    pub role: Role,
    pub iterations: u64,
    pub records: u64,
    pub hints_applied: u64,
    pub hints_rejected: u64,
}
