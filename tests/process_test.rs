/*!
 * Stage Process Tests
 * fork, join and kill of stage children
 */

use anti_lru::orchestrator::{
    failures, join_stage, kill_stages, spawn_stage, OrchestratorError, StageExit, StageOutcome,
};
use anti_lru::{NamedSemaphore, Role};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

/// Semaphore nobody posts, so a child waiting on it blocks until killed
struct Gate {
    name: String,
    handle: NamedSemaphore,
}

impl Gate {
    fn new(tag: &str) -> Self {
        let name = format!("/anti_lru_it_{}_gate_{}", std::process::id(), tag);
        let _ = NamedSemaphore::unlink(&name);
        let (handle, _) = NamedSemaphore::acquire(&name, 0o660).unwrap();
        Self { name, handle }
    }

    fn spawn_blocked(&self, position: usize) -> Pid {
        let name = self.name.clone();
        spawn_stage(position, move || {
            match NamedSemaphore::open(&name).and_then(|sem| sem.wait()) {
                Ok(()) => 0,
                Err(_) => 1,
            }
        })
        .unwrap()
    }

    fn close(self) {
        self.handle.close().unwrap();
        NamedSemaphore::unlink(&self.name).unwrap();
    }
}

fn outcome(position: usize, pid: Pid, exit: StageExit) -> StageOutcome {
    StageOutcome {
        position,
        role: Role::for_position(position, 2),
        pid: pid.as_raw(),
        exit,
        log_path: PathBuf::from(format!("{}.log", position)),
    }
}

#[test]
#[serial]
fn test_exit_codes_are_joined() {
    let ok = spawn_stage(0, || 0).unwrap();
    let failed = spawn_stage(1, || 1).unwrap();

    assert_eq!(join_stage(0, ok).unwrap(), StageExit::Exited { code: 0 });
    assert_eq!(join_stage(1, failed).unwrap(), StageExit::Exited { code: 1 });
}

#[test]
#[serial]
fn test_kill_stages_reaps_blocked_children() {
    let gate = Gate::new("kill");
    let pids = vec![gate.spawn_blocked(0), gate.spawn_blocked(1)];
    thread::sleep(Duration::from_millis(50));

    kill_stages(&pids);

    for &pid in &pids {
        // Reaped children no longer exist, even as zombies.
        assert_eq!(kill(pid, None), Err(Errno::ESRCH));
        assert!(matches!(
            join_stage(0, pid),
            Err(OrchestratorError::Join {
                source: Errno::ECHILD,
                ..
            })
        ));
    }
    gate.close();
}

#[test]
#[serial]
fn test_signaled_stage_fails_the_run() {
    let gate = Gate::new("signal");
    let done = spawn_stage(0, || 0).unwrap();
    let blocked = gate.spawn_blocked(1);
    thread::sleep(Duration::from_millis(50));

    kill(blocked, Signal::SIGKILL).unwrap();
    let exit = join_stage(1, blocked).unwrap();
    assert_eq!(
        exit,
        StageExit::Signaled {
            signal: "SIGKILL".to_string()
        }
    );
    assert!(!exit.success());

    let outcomes = vec![
        outcome(0, done, join_stage(0, done).unwrap()),
        outcome(1, blocked, exit),
    ];
    match failures(&outcomes) {
        Some(OrchestratorError::StageFailed {
            failed,
            nodes,
            details,
        }) => {
            assert_eq!(failed, 1);
            assert_eq!(nodes, 2);
            assert_eq!(details, "stage 1 (signal SIGKILL)");
        }
        other => panic!("expected StageFailed, got {:?}", other),
    }
    gate.close();
}
