/*!
 * anti-lru Library
 * Fork-based shared-memory pipeline harness with per-hop timestamping
 */

pub mod config;
pub mod core;
pub mod ipc;
pub mod memory;
pub mod monitoring;
pub mod orchestrator;
pub mod stage;

// Re-exports
pub use crate::config::{ConfigError, PipelineConfig};
pub use crate::core::{HarnessError, HarnessResult, Iteration, Micros, Position, Word};
pub use crate::ipc::{IpcError, NamedSemaphore, SharedChannel};
pub use crate::memory::{EvictionHint, MemoryError, PressureMode, PrivateBuffer};
pub use crate::monitoring::{
    init_tracing, load_run, EventTag, LogRecord, RunReport, TimestampRecorder,
};
pub use crate::orchestrator::{Orchestrator, OrchestratorError, RunSummary, StageExit};
pub use crate::stage::{Doubling, Role, StageError, Transform};
