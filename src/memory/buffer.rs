/*!
 * Private Buffer
 * Page-aligned, process-private working memory for one stage
 *
 * Backed by its own anonymous mapping rather than the heap so that eviction
 * advice covers exactly the message pages and nothing else.
 */

use super::pressure::EvictionHint;
use super::types::{MemoryError, MemoryResult};
use crate::core::types::{Size, Word, WORD_BYTES};
use nix::errno::Errno;
use nix::sys::mman::{mmap_anonymous, munmap, MapFlags, ProtFlags};
use std::num::NonZeroUsize;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::slice;
use tracing::warn;

/// Private anonymous mapping viewed as a slice of words
#[derive(Debug)]
pub struct PrivateBuffer {
    base: NonNull<Word>,
    bytes: Size,
}

// SAFETY: the mapping is MAP_PRIVATE and owned solely by this value.
unsafe impl Send for PrivateBuffer {}

impl PrivateBuffer {
    /// Map a zero-filled buffer of `bytes` (truncated to whole words)
    pub fn zeroed(bytes: Size) -> MemoryResult<Self> {
        let length =
            NonZeroUsize::new(bytes / WORD_BYTES * WORD_BYTES).ok_or(MemoryError::EmptyBuffer)?;

        // SAFETY: a fresh anonymous mapping aliases no existing memory.
        let base = unsafe {
            mmap_anonymous(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_PRIVATE,
            )
        }
        .map_err(|source| MemoryError::AllocationFailed { bytes, source })?;

        Ok(Self {
            base: base.cast::<Word>(),
            bytes: length.get(),
        })
    }

    /// Map a buffer with every word set to `value`
    pub fn filled(bytes: Size, value: Word) -> MemoryResult<Self> {
        let mut buffer = Self::zeroed(bytes)?;
        buffer.fill(value);
        Ok(buffer)
    }

    pub fn bytes(&self) -> Size {
        self.bytes
    }

    /// Ask the kernel to evict this buffer's pages
    pub fn advise(&self, hint: EvictionHint) -> MemoryResult<()> {
        // SAFETY: base/bytes describe a live mapping owned by self; the
        // eviction advices never change its contents.
        let rc = unsafe { libc::madvise(self.base.as_ptr().cast(), self.bytes, hint.advice()) };
        Errno::result(rc)
            .map(drop)
            .map_err(|source| MemoryError::AdviseRejected { hint, source })
    }
}

impl Deref for PrivateBuffer {
    type Target = [Word];

    fn deref(&self) -> &[Word] {
        // SAFETY: the mapping holds bytes / WORD_BYTES initialized words and
        // is only reachable through self.
        unsafe { slice::from_raw_parts(self.base.as_ptr(), self.bytes / WORD_BYTES) }
    }
}

impl DerefMut for PrivateBuffer {
    fn deref_mut(&mut self) -> &mut [Word] {
        // SAFETY: as in deref, and &mut self guarantees exclusivity.
        unsafe { slice::from_raw_parts_mut(self.base.as_ptr(), self.bytes / WORD_BYTES) }
    }
}

impl Drop for PrivateBuffer {
    fn drop(&mut self) {
        // SAFETY: base/bytes describe the mapping created in `zeroed`; no
        // borrow of it can outlive self.
        if let Err(source) = unsafe { munmap(self.base.cast(), self.bytes) } {
            warn!(
                error = %MemoryError::ReleaseFailed { bytes: self.bytes, source },
                "Failed to release private buffer"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filled_buffer() {
        let buffer = PrivateBuffer::filled(16 * 1024, 1).unwrap();
        assert_eq!(buffer.len(), 4096);
        assert_eq!(buffer.bytes(), 16 * 1024);
        assert!(buffer.iter().all(|&w| w == 1));
    }

    #[test]
    fn test_zeroed_rounds_to_words() {
        let buffer = PrivateBuffer::zeroed(4099).unwrap();
        assert_eq!(buffer.len(), 1024);
        assert!(buffer.iter().all(|&w| w == 0));
    }

    #[test]
    fn test_empty_rejected() {
        assert_eq!(PrivateBuffer::zeroed(0).unwrap_err(), MemoryError::EmptyBuffer);
        assert_eq!(PrivateBuffer::zeroed(3).unwrap_err(), MemoryError::EmptyBuffer);
    }

    #[test]
    fn test_advise_preserves_contents() {
        let mut buffer = PrivateBuffer::zeroed(256 * 1024).unwrap();
        for (i, w) in buffer.iter_mut().enumerate() {
            *w = i as Word;
        }

        for hint in [EvictionHint::Cold, EvictionHint::Pageout] {
            // Older kernels reject these; the data must survive either way.
            let _ = buffer.advise(hint);
            assert!(buffer.iter().enumerate().all(|(i, &w)| w == i as Word));
        }
    }
}
