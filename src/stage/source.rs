/*!
 * Source Stage
 * Paces the pipeline and publishes the initial message
 */

use super::role::{Role, StageRuntime};
use super::types::{StageResult, StageSummary};
use crate::config::PipelineConfig;
use crate::core::limits::SOURCE_FILL;
use crate::core::types::{Iteration, Position};
use crate::ipc::{ChannelWriter, Link};
use crate::memory::{PressureHook, PrivateBuffer};
use crate::monitoring::{EventTag, TimestampRecorder};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::thread;
use std::time::Duration;
use tracing::{debug, trace};

/// Position 0 of the chain
#[derive(Debug)]
pub struct Source<W: Write = BufWriter<File>> {
    position: Position,
    period: Duration,
    message: PrivateBuffer,
    writer: ChannelWriter,
    recorder: TimestampRecorder<W>,
    pressure: PressureHook,
    completed: u64,
}

impl<W: Write> Source<W> {
    pub fn init(
        config: &PipelineConfig,
        position: Position,
        downstream: Link,
        recorder: TimestampRecorder<W>,
    ) -> StageResult<Self> {
        let writer = ChannelWriter::open(downstream)?;
        let message = PrivateBuffer::filled(config.message_bytes, SOURCE_FILL)?;

        Ok(Self {
            position,
            period: config.period,
            message,
            writer,
            recorder,
            pressure: PressureHook::new(config.pressure, position),
            completed: 0,
        })
    }
}

impl<W: Write> StageRuntime for Source<W> {
    fn position(&self) -> Position {
        self.position
    }

    fn role(&self) -> Role {
        Role::Source
    }

    fn run_iteration(&mut self, iteration: Iteration) -> StageResult<()> {
        thread::sleep(self.period);

        self.recorder.record(iteration, EventTag::SendStart)?;
        self.writer.write(&self.message)?;
        self.recorder.record(iteration, EventTag::SendEnd)?;
        self.writer.signal()?;
        trace!(
            position = self.position,
            iteration,
            channel = self.writer.channel().index(),
            "Published message"
        );

        self.pressure.apply(&self.message);
        self.completed += 1;
        debug!(position = self.position, iteration, "Source iteration done");
        Ok(())
    }

    fn finish(self) -> StageResult<StageSummary> {
        let records = self.recorder.records();
        self.recorder.finish()?;
        self.writer.close()?;

        Ok(StageSummary {
            position: self.position,
            role: Role::Source,
            iterations: self.completed,
            records,
            hints_applied: self.pressure.applied(),
            hints_rejected: self.pressure.rejected(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::limits::SEMAPHORE_MODE;
    use crate::ipc::{NamedSemaphore, SharedChannel};
    use crate::memory::PressureMode;

    #[test]
    fn test_source_publishes_fill_pattern() {
        let name = format!("/anti_lru_unit_{}_source", std::process::id());
        let _ = NamedSemaphore::unlink(&name);
        let (ready, _) = NamedSemaphore::acquire(&name, SEMAPHORE_MODE).unwrap();

        let config = PipelineConfig {
            message_bytes: 8192,
            period: Duration::from_millis(1),
            pressure: PressureMode::Cold,
            ..Default::default()
        };
        let channel = SharedChannel::map(0, config.message_bytes).unwrap();
        // SAFETY: channel outlives the source.
        let view = unsafe { channel.borrowed_view() };

        let mut source = Source::init(
            &config,
            0,
            Link {
                channel: view,
                semaphore: name.clone(),
            },
            TimestampRecorder::new(Vec::new(), 0),
        )
        .unwrap();

        for k in 0..3 {
            source.run_iteration(k).unwrap();
        }
        assert_eq!(ready.value().unwrap(), 3);

        let mut out = vec![0; config.words()];
        channel.read_into(&mut out).unwrap();
        assert!(out.iter().all(|&w| w == SOURCE_FILL));

        let summary = source.finish().unwrap();
        assert_eq!(summary.role, Role::Source);
        assert_eq!(summary.iterations, 3);
        assert_eq!(summary.records, 6);
        assert_eq!(summary.hints_applied + summary.hints_rejected, 3);

        ready.close().unwrap();
        NamedSemaphore::unlink(&name).unwrap();
    }
}
