/*!
 * Memory Module
 * Private working buffers and the memory-pressure hook
 */

pub mod buffer;
pub mod pressure;
pub mod types;

// Re-export for convenience
pub use buffer::PrivateBuffer;
pub use pressure::{EvictionHint, PressureHook, PressureMode};
pub use types::{MemoryError, MemoryResult};
