/*!
 * Core Types
 * Common types used across the harness
 */

/// Fixed-width element of every message
pub type Word = i32;

/// 0-based pipeline position of a stage
pub type Position = usize;

/// Per-stage loop index, in `[0, iterations)`
pub type Iteration = u64;

/// Wall-clock timestamp in microseconds since the Unix epoch
pub type Micros = u64;

/// Size type for memory operations
pub type Size = usize;

/// Width of one message element in bytes
pub const WORD_BYTES: Size = std::mem::size_of::<Word>();

/// Common result type for harness operations
pub type HarnessResult<T> = Result<T, super::errors::HarnessError>;
