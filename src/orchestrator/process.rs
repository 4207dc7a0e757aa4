/*!
 * Stage Processes
 * fork, join and kill helpers for stage children
 */

use super::types::{OrchestratorError, OrchestratorResult, StageExit};
use crate::core::types::Position;
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
use tracing::{debug, warn};

/// Fork a child that runs `body` and exits with its return value
///
/// Must be called while the process is single-threaded.
pub fn spawn_stage<F>(position: Position, body: F) -> OrchestratorResult<Pid>
where
    F: FnOnce() -> i32,
{
    // SAFETY: the orchestrator forks from a single-threaded process, and the
    // child never returns into the caller: it runs `body` and exits.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => {
            debug!(position, pid = child.as_raw(), "Spawned stage");
            Ok(child)
        }
        Ok(ForkResult::Child) => std::process::exit(body()),
        Err(source) => Err(OrchestratorError::Spawn { position, source }),
    }
}

/// Block until the stage terminates
pub fn join_stage(position: Position, pid: Pid) -> OrchestratorResult<StageExit> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(StageExit::Exited { code }),
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                return Ok(StageExit::Signaled {
                    signal: signal.as_str().to_string(),
                })
            }
            Ok(_) | Err(Errno::EINTR) => continue,
            Err(source) => {
                return Err(OrchestratorError::Join {
                    position,
                    pid: pid.as_raw(),
                    source,
                })
            }
        }
    }
}

/// Kill and reap stages that must not outlive a failed run
pub fn kill_stages(pids: &[Pid]) {
    for (position, &pid) in pids.iter().enumerate() {
        if let Err(e) = kill(pid, Signal::SIGKILL) {
            warn!(position, pid = pid.as_raw(), error = %e, "Failed to kill stage");
        }
        match join_stage(position, pid) {
            Ok(exit) => debug!(position, %exit, "Reaped killed stage"),
            Err(e) => warn!(position, error = %e, "Failed to reap killed stage"),
        }
    }
}
