/*!
 * Error Types
 * Unified harness error over every subsystem's error enum
 */

use miette::Diagnostic;
use thiserror::Error;

pub use crate::config::ConfigError;
pub use crate::ipc::IpcError;
pub use crate::memory::MemoryError;
pub use crate::monitoring::{AnalysisError, RecorderError};
pub use crate::orchestrator::OrchestratorError;
pub use crate::stage::StageError;

/// Any error the harness can report
#[derive(Error, Debug, Diagnostic)]
pub enum HarnessError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Ipc(#[from] IpcError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Recorder(#[from] RecorderError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("Cannot encode run summary: {0}")]
    #[diagnostic(code(harness::summary_encode))]
    SummaryEncode(#[from] serde_json::Error),
}
