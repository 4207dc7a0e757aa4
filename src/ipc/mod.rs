/*!
 * IPC Module
 * Shared-memory channels and the named semaphores that signal them
 */

pub mod channel;
pub mod endpoint;
pub mod semaphore;
pub mod types;

// Re-export for convenience
pub use channel::SharedChannel;
pub use endpoint::{ChannelReader, ChannelWriter, Link, StageLinks};
pub use semaphore::{semaphore_name, Acquired, NamedSemaphore};
pub use types::{IpcError, IpcResult};
