/*!
 * Shared Channel
 * Fixed-size shared mapping between one producer and one consumer
 *
 * The mapping is MAP_SHARED | MAP_ANONYMOUS and created by the orchestrator
 * before it forks, so every stage inherits it at the same address. Only the
 * two adjacent stages keep it mapped.
 */

use super::types::{IpcError, IpcResult};
use crate::core::types::{Size, Word, WORD_BYTES};
use nix::sys::mman::{mmap_anonymous, munmap, MapFlags, ProtFlags};
use std::num::NonZeroUsize;
use std::ptr::{self, NonNull};
use tracing::{trace, warn};

/// Shared memory region backing one hop of the pipeline
#[derive(Debug)]
pub struct SharedChannel {
    index: usize,
    base: NonNull<Word>,
    bytes: Size,
    mapped: bool,
}

// SAFETY: the mapping is owned by this value; moving it to another thread
// moves the only handle. Cross-process access is ordered by the paired
// semaphore.
unsafe impl Send for SharedChannel {}

impl SharedChannel {
    /// Map a zero-filled shared region of `bytes` for channel `index`
    ///
    /// `bytes` must be a whole number of words.
    pub fn map(index: usize, bytes: Size) -> IpcResult<Self> {
        let length = NonZeroUsize::new(bytes / WORD_BYTES * WORD_BYTES)
            .ok_or(IpcError::EmptyChannel { channel: index })?;

        // SAFETY: a fresh anonymous mapping aliases no existing memory.
        let base = unsafe {
            mmap_anonymous(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
            )
        }
        .map_err(|source| IpcError::MapFailed {
            channel: index,
            bytes,
            source,
        })?;

        trace!(channel = index, bytes = length.get(), "Mapped shared channel");

        Ok(Self {
            index,
            base: base.cast::<Word>(),
            bytes: length.get(),
            mapped: true,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Size of the mapping in bytes
    pub fn bytes(&self) -> Size {
        self.bytes
    }

    /// Number of words a message occupies
    pub fn words(&self) -> usize {
        self.bytes / WORD_BYTES
    }

    /// Whole-buffer write pass from `src`
    ///
    /// Only the channel's producer calls this, and only while the consumer
    /// is not reading (it has not yet been signalled for this message).
    pub fn write(&mut self, src: &[Word]) -> IpcResult<()> {
        self.check_len(src.len())?;

        // SAFETY: base points to `words()` writable words; src has the same
        // length and lives in private memory, so the ranges never overlap.
        unsafe { ptr::copy_nonoverlapping(src.as_ptr(), self.base.as_ptr(), src.len()) };
        Ok(())
    }

    /// Whole-buffer read pass into `dst`
    ///
    /// Only the channel's consumer calls this, after waiting on the paired
    /// semaphore.
    pub fn read_into(&self, dst: &mut [Word]) -> IpcResult<()> {
        self.check_len(dst.len())?;

        // SAFETY: base points to `words()` readable words; dst is private
        // memory of the same length.
        unsafe { ptr::copy_nonoverlapping(self.base.as_ptr(), dst.as_mut_ptr(), dst.len()) };
        Ok(())
    }

    /// Second handle to the same mapping that never unmaps it
    ///
    /// Lets threads of one process stand in for forked stages.
    ///
    /// # Safety
    ///
    /// `self` must stay mapped for as long as the view is used.
    pub unsafe fn borrowed_view(&self) -> Self {
        Self {
            index: self.index,
            base: self.base,
            bytes: self.bytes,
            mapped: false,
        }
    }

    /// Release this process's view of the mapping
    pub fn unmap(mut self) -> IpcResult<()> {
        self.release()
    }

    fn release(&mut self) -> IpcResult<()> {
        if !self.mapped {
            return Ok(());
        }
        self.mapped = false;

        // SAFETY: base/bytes describe the mapping created in `map`, and no
        // slice into it outlives this call.
        unsafe { munmap(self.base.cast(), self.bytes) }.map_err(|source| {
            IpcError::UnmapFailed {
                channel: self.index,
                source,
            }
        })?;

        trace!(channel = self.index, "Unmapped shared channel");
        Ok(())
    }

    fn check_len(&self, actual: usize) -> IpcResult<()> {
        if actual != self.words() {
            return Err(IpcError::LengthMismatch {
                channel: self.index,
                expected: self.words(),
                actual,
            });
        }
        Ok(())
    }
}

impl Drop for SharedChannel {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(channel = self.index, error = %e, "Failed to unmap channel during drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_map_is_zero_filled() {
        let channel = SharedChannel::map(0, 4096).unwrap();
        assert_eq!(channel.words(), 1024);

        let mut out = vec![7; 1024];
        channel.read_into(&mut out).unwrap();
        assert!(out.iter().all(|&w| w == 0));
    }

    #[test]
    fn test_write_then_read() {
        let mut channel = SharedChannel::map(3, 64 * 1024).unwrap();
        let words = channel.words();
        let src: Vec<Word> = (0..words as Word).collect();

        channel.write(&src).unwrap();

        let mut dst = vec![0; words];
        channel.read_into(&mut dst).unwrap();
        assert_eq!(dst, src);
        channel.unmap().unwrap();
    }

    #[test]
    fn test_length_mismatch() {
        let mut channel = SharedChannel::map(1, 4096).unwrap();

        let result = channel.write(&[1, 2, 3]);
        assert_eq!(
            result,
            Err(IpcError::LengthMismatch {
                channel: 1,
                expected: 1024,
                actual: 3,
            })
        );

        let mut short = vec![0; 10];
        assert!(channel.read_into(&mut short).is_err());
    }

    #[test]
    fn test_empty_channel_rejected() {
        assert_eq!(
            SharedChannel::map(2, 0).unwrap_err(),
            IpcError::EmptyChannel { channel: 2 }
        );
        assert_eq!(
            SharedChannel::map(2, WORD_BYTES - 1).unwrap_err(),
            IpcError::EmptyChannel { channel: 2 }
        );
    }

    #[test]
    fn test_borrowed_view_shares_memory() {
        let mut owner = SharedChannel::map(4, 4096).unwrap();
        // SAFETY: owner outlives the view.
        let view = unsafe { owner.borrowed_view() };
        owner.write(&vec![11; 1024]).unwrap();

        let mut out = vec![0; 1024];
        view.read_into(&mut out).unwrap();
        assert!(out.iter().all(|&w| w == 11));

        view.unmap().unwrap();
        owner.read_into(&mut out).unwrap();
        owner.unmap().unwrap();
    }

    #[test]
    fn test_visible_across_threads() {
        let mut channel = SharedChannel::map(0, 4096).unwrap();
        channel.write(&vec![9; 1024]).unwrap();

        let handle = std::thread::spawn(move || {
            let mut out = vec![0; channel.words()];
            channel.read_into(&mut out).unwrap();
            out
        });
        assert!(handle.join().unwrap().iter().all(|&w| w == 9));
    }
}
