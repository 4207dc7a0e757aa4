/*!
 * IPC Types
 * Errors shared by channels and named semaphores
 */

use miette::Diagnostic;
use nix::errno::Errno;
use thiserror::Error;

/// IPC operation result
pub type IpcResult<T> = Result<T, IpcError>;

/// Channel and semaphore errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum IpcError {
    #[error("Channel {channel} cannot be empty")]
    #[diagnostic(
        code(ipc::empty_channel),
        help("Message size must be at least one element wide.")
    )]
    EmptyChannel { channel: usize },

    #[error("mmap of channel {channel} ({bytes} bytes) failed: {source}")]
    #[diagnostic(
        code(ipc::map_failed),
        help("The system may be low on memory. Reduce node count or message size.")
    )]
    MapFailed {
        channel: usize,
        bytes: usize,
        source: Errno,
    },

    #[error("munmap of channel {channel} failed: {source}")]
    #[diagnostic(code(ipc::unmap_failed))]
    UnmapFailed { channel: usize, source: Errno },

    #[error("Message length mismatch on channel {channel}: expected {expected} words, got {actual}")]
    #[diagnostic(
        code(ipc::length_mismatch),
        help("Producer and consumer buffers must match the channel size exactly.")
    )]
    LengthMismatch {
        channel: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid semaphore name '{0}'")]
    #[diagnostic(
        code(ipc::invalid_name),
        help("Names start with '/', contain no other '/', no NUL, and fit within 251 bytes.")
    )]
    InvalidName(String),

    #[error("sem_open '{name}' failed: {source}")]
    #[diagnostic(code(ipc::semaphore_open))]
    SemaphoreOpen { name: String, source: Errno },

    #[error("Semaphore '{0}' does not exist")]
    #[diagnostic(
        code(ipc::semaphore_not_found),
        help("The orchestrator creates every semaphore before spawning stages.")
    )]
    SemaphoreNotFound(String),

    #[error("sem_wait '{name}' failed: {source}")]
    #[diagnostic(code(ipc::semaphore_wait))]
    SemaphoreWait { name: String, source: Errno },

    #[error("sem_post '{name}' failed: {source}")]
    #[diagnostic(code(ipc::semaphore_post))]
    SemaphorePost { name: String, source: Errno },

    #[error("sem_getvalue '{name}' failed: {source}")]
    #[diagnostic(code(ipc::semaphore_value))]
    SemaphoreValue { name: String, source: Errno },

    #[error("sem_close '{name}' failed: {source}")]
    #[diagnostic(code(ipc::semaphore_close))]
    SemaphoreClose { name: String, source: Errno },

    #[error("sem_unlink '{name}' failed: {source}")]
    #[diagnostic(
        code(ipc::semaphore_unlink),
        help("Another process may have removed the semaphore already.")
    )]
    SemaphoreUnlink { name: String, source: Errno },
}
