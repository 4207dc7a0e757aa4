/*!
 * Memory-Pressure Hook
 *
 * Optional per-iteration advice that asks the kernel to evict a stage's own
 * working buffer right after it has been consumed, so the next access pays a
 * fresh page-fault cost. The advice is only a hint: a rejected hint is
 * logged once and counted, never treated as a failure.
 */

use super::buffer::PrivateBuffer;
use super::types::MemoryError;
use crate::core::types::Position;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Eviction advice passed to madvise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionHint {
    /// Deactivate the pages so they are reclaimed first
    Cold,
    /// Reclaim the pages immediately
    Pageout,
}

impl EvictionHint {
    pub(crate) fn advice(self) -> libc::c_int {
        match self {
            EvictionHint::Cold => libc::MADV_COLD,
            EvictionHint::Pageout => libc::MADV_PAGEOUT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EvictionHint::Cold => "cold",
            EvictionHint::Pageout => "pageout",
        }
    }
}

impl fmt::Display for EvictionHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run-wide pressure injection mode, shared by every stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureMode {
    #[default]
    Disabled,
    Cold,
    Pageout,
}

impl PressureMode {
    pub fn hint(self) -> Option<EvictionHint> {
        match self {
            PressureMode::Disabled => None,
            PressureMode::Cold => Some(EvictionHint::Cold),
            PressureMode::Pageout => Some(EvictionHint::Pageout),
        }
    }
}

/// Applies the run's eviction hint to one stage's private buffer
#[derive(Debug)]
pub struct PressureHook {
    position: Position,
    hint: Option<EvictionHint>,
    applied: u64,
    rejected: u64,
}

impl PressureHook {
    pub fn new(mode: PressureMode, position: Position) -> Self {
        Self {
            position,
            hint: mode.hint(),
            applied: 0,
            rejected: 0,
        }
    }

    /// Advise the kernel to evict `buffer`; a no-op when disabled
    pub fn apply(&mut self, buffer: &PrivateBuffer) {
        let Some(hint) = self.hint else {
            return;
        };

        match buffer.advise(hint) {
            Ok(()) => self.applied += 1,
            Err(MemoryError::AdviseRejected { source, .. }) if self.rejected == 0 => {
                self.rejected += 1;
                warn!(
                    position = self.position,
                    %hint,
                    error = %source,
                    "Eviction hint rejected; continuing without it"
                );
            }
            Err(_) => self.rejected += 1,
        }
    }

    pub fn applied(&self) -> u64 {
        self.applied
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_hints() {
        assert_eq!(PressureMode::default(), PressureMode::Disabled);
        assert_eq!(PressureMode::Disabled.hint(), None);
        assert_eq!(PressureMode::Cold.hint(), Some(EvictionHint::Cold));
        assert_eq!(PressureMode::Pageout.hint(), Some(EvictionHint::Pageout));
    }

    #[test]
    fn test_advice_values() {
        assert_eq!(EvictionHint::Cold.advice(), libc::MADV_COLD);
        assert_eq!(EvictionHint::Pageout.advice(), libc::MADV_PAGEOUT);
        assert_ne!(EvictionHint::Cold.advice(), EvictionHint::Pageout.advice());
    }

    #[test]
    fn test_disabled_hook_never_advises() {
        let buffer = PrivateBuffer::filled(4096, 1).unwrap();
        let mut hook = PressureHook::new(PressureMode::Disabled, 0);
        for _ in 0..3 {
            hook.apply(&buffer);
        }
        assert_eq!(hook.applied(), 0);
        assert_eq!(hook.rejected(), 0);
    }

    #[test]
    fn test_enabled_hook_accounts_every_call() {
        let buffer = PrivateBuffer::filled(64 * 1024, 3).unwrap();
        let mut hook = PressureHook::new(PressureMode::Cold, 1);
        for _ in 0..4 {
            hook.apply(&buffer);
        }
        assert_eq!(hook.applied() + hook.rejected(), 4);
        // Whether or not the kernel honored it, contents survive.
        assert!(buffer.iter().all(|&w| w == 3));
    }

    #[test]
    fn test_mode_serde_names() {
        assert_eq!(serde_json::to_string(&PressureMode::Cold).unwrap(), "\"cold\"");
        assert_eq!(
            serde_json::to_string(&PressureMode::Disabled).unwrap(),
            "\"disabled\""
        );
    }
}
