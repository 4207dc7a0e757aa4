/*!
 * Named Semaphores
 * POSIX counting semaphores that carry the "data ready" signal of a channel
 *
 * The orchestrator creates one semaphore per channel before any stage
 * exists; stages open them by name. Named semaphores outlive the processes
 * that open them, so a crashed run can leave one behind. `acquire` resolves
 * that case to a single outcome: a semaphore with value zero, whether it was
 * freshly created or re-attached and drained. Two runs sharing a prefix at
 * the same time are not supported.
 */

use super::types::{IpcError, IpcResult};
use crate::core::limits::MAX_SEMAPHORE_NAME;
use nix::errno::Errno;
use std::ffi::CString;
use std::fmt;
use std::ptr::NonNull;
use tracing::{debug, warn};

/// Name of the semaphore paired with `channel`
pub fn semaphore_name(prefix: &str, channel: usize) -> String {
    format!("{}{}", prefix, channel)
}

/// How `NamedSemaphore::acquire` obtained its handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquired {
    /// No semaphore existed under the name
    Created,
    /// A stale semaphore was re-opened and reset to zero
    Attached { drained: u32 },
}

/// Handle to an open POSIX named semaphore
pub struct NamedSemaphore {
    name: String,
    handle: NonNull<libc::sem_t>,
    closed: bool,
}

// SAFETY: POSIX semaphores are designed for concurrent use from any thread or
// process; the handle is only passed to sem_* functions.
unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

impl NamedSemaphore {
    /// Create `name` with value 0, or re-open and drain a leftover one
    pub fn acquire(name: &str, mode: u32) -> IpcResult<(Self, Acquired)> {
        let c_name = Self::c_name(name)?;

        // SAFETY: c_name is NUL-terminated; the variadic arguments are the
        // mode_t and unsigned initial value sem_open reads with O_CREAT.
        let raw = unsafe {
            libc::sem_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL,
                mode as libc::mode_t,
                0 as libc::c_uint,
            )
        };

        if let Some(handle) = Self::handle_from(raw) {
            debug!(name, "Created semaphore");
            return Ok((Self::from_parts(name, handle), Acquired::Created));
        }

        match Errno::last() {
            Errno::EEXIST => {
                let sem = Self::open(name)?;
                let drained = sem.drain()?;
                if drained > 0 {
                    warn!(name, drained, "Re-attached stale semaphore with pending posts");
                } else {
                    debug!(name, "Re-attached existing semaphore");
                }
                Ok((sem, Acquired::Attached { drained }))
            }
            source => Err(IpcError::SemaphoreOpen {
                name: name.to_string(),
                source,
            }),
        }
    }

    /// Open an existing semaphore without creating it
    pub fn open(name: &str) -> IpcResult<Self> {
        let c_name = Self::c_name(name)?;

        // SAFETY: c_name is NUL-terminated; without O_CREAT no variadic
        // arguments are read.
        let raw = unsafe { libc::sem_open(c_name.as_ptr(), 0) };

        match Self::handle_from(raw) {
            Some(handle) => Ok(Self::from_parts(name, handle)),
            None => match Errno::last() {
                Errno::ENOENT => Err(IpcError::SemaphoreNotFound(name.to_string())),
                source => Err(IpcError::SemaphoreOpen {
                    name: name.to_string(),
                    source,
                }),
            },
        }
    }

    /// Whether `name` currently resolves in the system namespace
    pub fn exists(name: &str) -> IpcResult<bool> {
        match Self::open(name) {
            Ok(sem) => {
                sem.close()?;
                Ok(true)
            }
            Err(IpcError::SemaphoreNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Remove `name` from the system namespace
    pub fn unlink(name: &str) -> IpcResult<()> {
        let c_name = Self::c_name(name)?;

        // SAFETY: c_name is NUL-terminated.
        let rc = unsafe { libc::sem_unlink(c_name.as_ptr()) };
        Errno::result(rc)
            .map(drop)
            .map_err(|source| IpcError::SemaphoreUnlink {
                name: name.to_string(),
                source,
            })
    }

    /// Block until the count is positive, then decrement it
    ///
    /// There is no timeout: a producer that never posts stalls the caller.
    pub fn wait(&self) -> IpcResult<()> {
        loop {
            // SAFETY: handle came from a successful sem_open and is open.
            let rc = unsafe { libc::sem_wait(self.handle.as_ptr()) };
            match Errno::result(rc) {
                Ok(_) => return Ok(()),
                Err(Errno::EINTR) => continue,
                Err(source) => {
                    return Err(IpcError::SemaphoreWait {
                        name: self.name.clone(),
                        source,
                    })
                }
            }
        }
    }

    /// Decrement without blocking; `false` when the count was zero
    pub fn try_wait(&self) -> IpcResult<bool> {
        loop {
            // SAFETY: handle came from a successful sem_open and is open.
            let rc = unsafe { libc::sem_trywait(self.handle.as_ptr()) };
            match Errno::result(rc) {
                Ok(_) => return Ok(true),
                Err(Errno::EAGAIN) => return Ok(false),
                Err(Errno::EINTR) => continue,
                Err(source) => {
                    return Err(IpcError::SemaphoreWait {
                        name: self.name.clone(),
                        source,
                    })
                }
            }
        }
    }

    /// Increment the count, waking one waiter
    pub fn post(&self) -> IpcResult<()> {
        // SAFETY: handle came from a successful sem_open and is open.
        let rc = unsafe { libc::sem_post(self.handle.as_ptr()) };
        Errno::result(rc)
            .map(drop)
            .map_err(|source| IpcError::SemaphorePost {
                name: self.name.clone(),
                source,
            })
    }

    /// Current count
    pub fn value(&self) -> IpcResult<i32> {
        let mut value: libc::c_int = 0;

        // SAFETY: handle is open and value is a valid out-pointer.
        let rc = unsafe { libc::sem_getvalue(self.handle.as_ptr(), &mut value) };
        Errno::result(rc)
            .map(|_| value)
            .map_err(|source| IpcError::SemaphoreValue {
                name: self.name.clone(),
                source,
            })
    }

    /// Consume every pending post, returning how many there were
    pub fn drain(&self) -> IpcResult<u32> {
        let mut drained = 0;
        while self.try_wait()? {
            drained += 1;
        }
        Ok(drained)
    }

    /// Close this process's handle; the name stays resolvable
    pub fn close(mut self) -> IpcResult<()> {
        self.closed = true;

        // SAFETY: handle is open and is not used again after this call.
        let rc = unsafe { libc::sem_close(self.handle.as_ptr()) };
        Errno::result(rc)
            .map(drop)
            .map_err(|source| IpcError::SemaphoreClose {
                name: self.name.clone(),
                source,
            })
    }

    fn from_parts(name: &str, handle: NonNull<libc::sem_t>) -> Self {
        Self {
            name: name.to_string(),
            handle,
            closed: false,
        }
    }

    fn handle_from(raw: *mut libc::sem_t) -> Option<NonNull<libc::sem_t>> {
        if raw == libc::SEM_FAILED {
            None
        } else {
            NonNull::new(raw)
        }
    }

    fn c_name(name: &str) -> IpcResult<CString> {
        let valid = name.len() > 1
            && name.len() <= MAX_SEMAPHORE_NAME
            && name.starts_with('/')
            && !name[1..].contains('/');
        if !valid {
            return Err(IpcError::InvalidName(name.to_string()));
        }
        CString::new(name).map_err(|_| IpcError::InvalidName(name.to_string()))
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        if !self.closed {
            // SAFETY: handle is still open; nothing uses it after drop.
            let rc = unsafe { libc::sem_close(self.handle.as_ptr()) };
            if rc != 0 {
                warn!(name = %self.name, error = %Errno::last(), "sem_close failed during drop");
            }
        }
    }
}

impl fmt::Debug for NamedSemaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedSemaphore")
            .field("name", &self.name)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::limits::SEMAPHORE_MODE;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn unique(tag: &str) -> String {
        format!("/anti_lru_unit_{}_{}", std::process::id(), tag)
    }

    #[test]
    fn test_semaphore_name_format() {
        assert_eq!(semaphore_name("/pipe_sem", 0), "/pipe_sem0");
        assert_eq!(semaphore_name("/pipe_sem", 42), "/pipe_sem42");
    }

    #[test]
    fn test_invalid_names_rejected() {
        for bad in ["", "/", "no_slash", "/nested/name", "/nul\0byte"] {
            let result = NamedSemaphore::open(bad);
            assert!(
                matches!(result, Err(IpcError::InvalidName(_))),
                "accepted {:?}",
                bad
            );
        }
        let long = format!("/{}", "x".repeat(MAX_SEMAPHORE_NAME));
        assert!(matches!(
            NamedSemaphore::open(&long),
            Err(IpcError::InvalidName(_))
        ));
    }

    #[test]
    fn test_acquire_creates_then_unlink_removes() {
        let name = unique("create");
        let _ = NamedSemaphore::unlink(&name);

        let (sem, outcome) = NamedSemaphore::acquire(&name, SEMAPHORE_MODE).unwrap();
        assert_eq!(outcome, Acquired::Created);
        assert_eq!(sem.value().unwrap(), 0);
        assert!(NamedSemaphore::exists(&name).unwrap());

        sem.close().unwrap();
        NamedSemaphore::unlink(&name).unwrap();
        assert!(!NamedSemaphore::exists(&name).unwrap());
    }

    #[test]
    fn test_acquire_drains_stale_semaphore() {
        let name = unique("stale");
        let _ = NamedSemaphore::unlink(&name);

        let (first, _) = NamedSemaphore::acquire(&name, SEMAPHORE_MODE).unwrap();
        first.post().unwrap();
        first.post().unwrap();
        first.post().unwrap();
        first.close().unwrap();

        let (second, outcome) = NamedSemaphore::acquire(&name, SEMAPHORE_MODE).unwrap();
        assert_eq!(outcome, Acquired::Attached { drained: 3 });
        assert_eq!(second.value().unwrap(), 0);
        assert!(!second.try_wait().unwrap());

        second.close().unwrap();
        NamedSemaphore::unlink(&name).unwrap();
    }

    #[test]
    fn test_open_missing_is_not_found() {
        let name = unique("missing");
        let _ = NamedSemaphore::unlink(&name);
        assert!(matches!(
            NamedSemaphore::open(&name),
            Err(IpcError::SemaphoreNotFound(_))
        ));
    }

    #[test]
    fn test_post_wakes_waiter() {
        let name = unique("wake");
        let _ = NamedSemaphore::unlink(&name);
        let (producer, _) = NamedSemaphore::acquire(&name, SEMAPHORE_MODE).unwrap();
        let consumer = Arc::new(NamedSemaphore::open(&name).unwrap());

        let waiter = Arc::clone(&consumer);
        let handle = thread::spawn(move || waiter.wait());

        thread::sleep(Duration::from_millis(20));
        producer.post().unwrap();

        assert!(handle.join().unwrap().is_ok());
        assert_eq!(consumer.value().unwrap(), 0);

        producer.close().unwrap();
        NamedSemaphore::unlink(&name).unwrap();
    }

    #[test]
    fn test_posts_are_counted() {
        let name = unique("count");
        let _ = NamedSemaphore::unlink(&name);
        let (sem, _) = NamedSemaphore::acquire(&name, SEMAPHORE_MODE).unwrap();

        for _ in 0..5 {
            sem.post().unwrap();
        }
        assert_eq!(sem.value().unwrap(), 5);
        for _ in 0..5 {
            sem.wait().unwrap();
        }
        assert!(!sem.try_wait().unwrap());

        sem.close().unwrap();
        NamedSemaphore::unlink(&name).unwrap();
    }
}
