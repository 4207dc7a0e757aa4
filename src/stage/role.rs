/*!
 * Stage Roles
 * Position-derived role and the per-iteration runtime contract
 */

use super::types::{StageResult, StageSummary};
use crate::core::types::{Iteration, Position};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a stage does each iteration, fixed by its position in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Position 0: paces and publishes the initial message
    Source,
    /// Positions 1..N-2: receive, transform, forward
    Relay,
    /// Position N-1: receive only
    Sink,
}

impl Role {
    /// Role of `position` in an N-stage chain
    ///
    /// Position 0 is always the Source, even for a degenerate chain.
    pub fn for_position(position: Position, nodes: usize) -> Self {
        if position == 0 {
            Role::Source
        } else if position + 1 >= nodes {
            Role::Sink
        } else {
            Role::Relay
        }
    }

    /// Whether the role reads channel `position - 1`
    pub fn reads_upstream(self) -> bool {
        !matches!(self, Role::Source)
    }

    /// Whether the role writes channel `position`
    pub fn writes_downstream(self) -> bool {
        !matches!(self, Role::Sink)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Source => "source",
            Role::Relay => "relay",
            Role::Sink => "sink",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Indices of the channels a stage keeps mapped, as (upstream, downstream)
pub fn adjacent_channels(position: Position, nodes: usize) -> (Option<usize>, Option<usize>) {
    let role = Role::for_position(position, nodes);
    let upstream = role.reads_upstream().then(|| position - 1);
    let downstream = role.writes_downstream().then_some(position);
    (upstream, downstream)
}

/// One stage in the RUNNING state
///
/// `run_iteration` is called with 0, 1, ... in order; `finish` moves the
/// stage to DONE, closing its handles and flushing its log.
pub trait StageRuntime {
    fn position(&self) -> Position;

    fn role(&self) -> Role;

    fn run_iteration(&mut self, iteration: Iteration) -> StageResult<()>;

    fn finish(self) -> StageResult<StageSummary>
    where
        Self: Sized;
}
