/*!
 * Memory Types
 * Errors for private working buffers and eviction hints
 */

use super::pressure::EvictionHint;
use miette::Diagnostic;
use nix::errno::Errno;
use thiserror::Error;

/// Memory operation result
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Memory errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum MemoryError {
    #[error("Buffer cannot be empty")]
    #[diagnostic(code(memory::empty_buffer))]
    EmptyBuffer,

    #[error("Private buffer allocation of {bytes} bytes failed: {source}")]
    #[diagnostic(
        code(memory::allocation_failed),
        help("The system may be low on memory. Reduce node count or message size.")
    )]
    AllocationFailed { bytes: usize, source: Errno },

    #[error("Private buffer release of {bytes} bytes failed: {source}")]
    #[diagnostic(code(memory::release_failed))]
    ReleaseFailed { bytes: usize, source: Errno },

    #[error("Kernel rejected {hint} eviction hint: {source}")]
    #[diagnostic(
        code(memory::advise_rejected),
        help("MADV_COLD and MADV_PAGEOUT need Linux 5.4 or newer.")
    )]
    AdviseRejected { hint: EvictionHint, source: Errno },
}
