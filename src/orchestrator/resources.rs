/*!
 * Pipeline Resources
 * The N-1 channels and named semaphores shared by a run
 *
 * Acquired by the orchestrator before the first fork so every stage
 * inherits the same mappings. After fork each stage keeps only its adjacent
 * channels. Unlinking the semaphore names is the orchestrator's job alone,
 * once every stage has been joined.
 */

use crate::config::PipelineConfig;
use crate::core::limits::SEMAPHORE_MODE;
use crate::core::types::Position;
use crate::ipc::{IpcResult, Link, NamedSemaphore, SharedChannel, StageLinks};
use crate::stage::adjacent_channels;
use tracing::{debug, warn};

/// Channels plus semaphore names, indexed by channel
#[derive(Debug)]
pub struct PipelineResources {
    channels: Vec<Option<SharedChannel>>,
    names: Vec<String>,
}

impl PipelineResources {
    /// Map every channel and create (or reset) every semaphore
    ///
    /// The orchestrator does not use the semaphores itself, so each handle
    /// is closed right after acquisition; the names stay linked.
    pub fn acquire(config: &PipelineConfig) -> IpcResult<Self> {
        let count = config.channels();

        let channels = (0..count)
            .map(|index| SharedChannel::map(index, config.message_bytes).map(Some))
            .collect::<IpcResult<Vec<_>>>()?;

        let mut names = Vec::with_capacity(count);
        for index in 0..count {
            let name = config.semaphore_name(index);
            match Self::acquire_semaphore(&name) {
                Ok(()) => names.push(name),
                Err(e) => {
                    unlink_all(&names);
                    return Err(e);
                }
            }
        }

        Ok(Self { channels, names })
    }

    fn acquire_semaphore(name: &str) -> IpcResult<()> {
        let (semaphore, _) = NamedSemaphore::acquire(name, SEMAPHORE_MODE)?;
        semaphore.close()
    }

    pub fn channels(&self) -> usize {
        self.names.len()
    }

    pub fn semaphore_names(&self) -> &[String] {
        &self.names
    }

    /// Hand the stage at `position` its adjacent links and unmap the rest
    ///
    /// Called in the forked child; leaves `self` with no channels.
    pub fn detach_links(&mut self, position: Position) -> IpcResult<StageLinks> {
        let (upstream, downstream) = adjacent_channels(position, self.channels.len() + 1);
        let mut links = StageLinks::default();

        for (index, slot) in self.channels.iter_mut().enumerate() {
            let Some(channel) = slot.take() else {
                continue;
            };

            if Some(index) == upstream {
                links.upstream = Some(Link {
                    channel,
                    semaphore: self.names[index].clone(),
                });
            } else if Some(index) == downstream {
                links.downstream = Some(Link {
                    channel,
                    semaphore: self.names[index].clone(),
                });
            } else {
                channel.unmap()?;
            }
        }
        Ok(links)
    }

    /// Unlink every semaphore name and unmap the orchestrator's views
    ///
    /// Attempts every step and reports the first failure.
    pub fn release(self) -> IpcResult<()> {
        let mut first_err = None;

        for name in &self.names {
            match NamedSemaphore::unlink(name) {
                Ok(()) => debug!(semaphore = %name, "Unlinked semaphore"),
                Err(e) => {
                    warn!(semaphore = %name, error = %e, "Failed to unlink semaphore");
                    first_err.get_or_insert(e);
                }
            }
        }

        for channel in self.channels.into_iter().flatten() {
            if let Err(e) = channel.unmap() {
                first_err.get_or_insert(e);
            }
        }

        first_err.map_or(Ok(()), Err)
    }
}

fn unlink_all(names: &[String]) {
    for name in names {
        if let Err(e) = NamedSemaphore::unlink(name) {
            warn!(semaphore = %name, error = %e, "Failed to unlink semaphore during rollback");
        }
    }
}
