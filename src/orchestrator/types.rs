/*!
 * Orchestrator Types
 * Run errors, per-stage outcomes and the run summary
 */

use crate::config::ConfigError;
use crate::core::types::Position;
use crate::ipc::IpcError;
use crate::memory::PressureMode;
use crate::stage::Role;
use miette::Diagnostic;
use nix::errno::Errno;
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Orchestrator operation result
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Failures that abort a whole run
#[derive(Error, Debug, Diagnostic)]
pub enum OrchestratorError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Ipc(#[from] IpcError),

    #[error("Cannot create log directory {path}: {source}")]
    #[diagnostic(code(orchestrator::log_dir))]
    LogDir { path: PathBuf, source: io::Error },

    #[error("fork failed for stage {position}: {source}")]
    #[diagnostic(
        code(orchestrator::spawn_failed),
        help("Stages already started were killed. Check process limits (ulimit -u) and memory.")
    )]
    Spawn { position: Position, source: Errno },

    #[error("waitpid failed for stage {position} (pid {pid}): {source}")]
    #[diagnostic(
        code(orchestrator::join_failed),
        help("Semaphores were left linked; remove stale /dev/shm/sem.* entries before rerunning.")
    )]
    Join {
        position: Position,
        pid: i32,
        source: Errno,
    },

    #[error("{failed} of {nodes} stages failed: {details}")]
    #[diagnostic(
        code(orchestrator::stage_failed),
        help("Each stage logs its own error on stderr; its log file may be partial.")
    )]
    StageFailed {
        failed: usize,
        nodes: usize,
        details: String,
    },
}

/// How a stage process terminated
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageExit {
    Exited { code: i32 },
    Signaled { signal: String },
}

impl StageExit {
    pub fn success(&self) -> bool {
        matches!(self, StageExit::Exited { code: 0 })
    }
}

impl fmt::Display for StageExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageExit::Exited { code } => write!(f, "exit {}", code),
            StageExit::Signaled { signal } => write!(f, "signal {}", signal),
        }
    }
}

/// One joined stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageOutcome {
    pub position: Position,
    pub role: Role,
    pub pid: i32,
    pub exit: StageExit,
    pub log_path: PathBuf,
}

/// Result of a clean run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub nodes: usize,
    pub iterations: u64,
    pub message_bytes: usize,
    pub pressure: PressureMode,
    pub stages: Vec<StageOutcome>,
    pub elapsed_ms: f64,
}

/// Build the StageFailed error for every unsuccessful outcome, if any
pub fn failures(outcomes: &[StageOutcome]) -> Option<OrchestratorError> {
    let failed: Vec<String> = outcomes
        .iter()
        .filter(|o| !o.exit.success())
        .map(|o| format!("stage {} ({})", o.position, o.exit))
        .collect();

    if failed.is_empty() {
        return None;
    }
    Some(OrchestratorError::StageFailed {
        failed: failed.len(),
        nodes: outcomes.len(),
        details: failed.join(", "),
    })
}
