/*!
 * Harness Limits and Constants
 *
 * Build-time defaults for the pipeline shape. The binary may override them at
 * start time; they never change while a run is in progress.
 */

use crate::core::types::Word;
use std::time::Duration;

// =============================================================================
// PIPELINE SHAPE
// =============================================================================

/// Default number of stages (one Source, three Relays, one Sink)
pub const DEFAULT_NODES: usize = 5;

/// Smallest legal pipeline: Source and Sink joined by a single channel
pub const MIN_NODES: usize = 2;

/// Default message size (10MiB)
pub const DEFAULT_MESSAGE_BYTES: usize = 10 * 1024 * 1024;

/// Default number of iterations every stage runs
pub const DEFAULT_ITERATIONS: u64 = 10;

/// Default Source pacing interval between publishes
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(100);

// =============================================================================
// PAYLOAD
// =============================================================================

/// Value every slot of the Source buffer is filled with
pub const SOURCE_FILL: Word = 1;

// =============================================================================
// NAMING AND OUTPUT
// =============================================================================

/// Default prefix for named semaphores; channel `i` uses `<prefix><i>`
pub const DEFAULT_SEMAPHORE_PREFIX: &str = "/anti_lru_sem";

/// Longest POSIX semaphore name accepted on Linux (NAME_MAX - 4, leading '/' included)
pub const MAX_SEMAPHORE_NAME: usize = 251;

/// Default directory that receives one `<position>.log` per stage
pub const DEFAULT_LOG_DIR: &str = "./log";

/// Permissions for created semaphores (owner and group read/write)
pub const SEMAPHORE_MODE: u32 = 0o660;
