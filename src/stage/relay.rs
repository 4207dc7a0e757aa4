/*!
 * Relay Stage
 * Receives, transforms and forwards one message per iteration
 */

use super::role::{Role, StageRuntime};
use super::transform::Transform;
use super::types::{StageResult, StageSummary};
use crate::config::PipelineConfig;
use crate::core::types::{Iteration, Position};
use crate::ipc::{ChannelReader, ChannelWriter, Link};
use crate::memory::{PressureHook, PrivateBuffer};
use crate::monitoring::{EventTag, TimestampRecorder};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;
use tracing::{debug, trace};

/// Any position strictly between Source and Sink
#[derive(Debug)]
pub struct Relay<W: Write = BufWriter<File>> {
    position: Position,
    reader: ChannelReader,
    writer: ChannelWriter,
    buffer: PrivateBuffer,
    transform: Arc<dyn Transform>,
    recorder: TimestampRecorder<W>,
    pressure: PressureHook,
    completed: u64,
}

impl<W: Write> Relay<W> {
    pub fn init(
        config: &PipelineConfig,
        position: Position,
        upstream: Link,
        downstream: Link,
        transform: Arc<dyn Transform>,
        recorder: TimestampRecorder<W>,
    ) -> StageResult<Self> {
        let reader = ChannelReader::open(upstream)?;
        let writer = ChannelWriter::open(downstream)?;
        let buffer = PrivateBuffer::zeroed(config.message_bytes)?;

        Ok(Self {
            position,
            reader,
            writer,
            buffer,
            transform,
            recorder,
            pressure: PressureHook::new(config.pressure, position),
            completed: 0,
        })
    }
}

impl<W: Write> StageRuntime for Relay<W> {
    fn position(&self) -> Position {
        self.position
    }

    fn role(&self) -> Role {
        Role::Relay
    }

    fn run_iteration(&mut self, iteration: Iteration) -> StageResult<()> {
        self.reader.wait()?;

        self.recorder.record(iteration, EventTag::RecvStart)?;
        self.reader.read_into(&mut self.buffer)?;
        self.recorder.record(iteration, EventTag::RecvEnd)?;

        self.transform.apply(&mut self.buffer);

        self.recorder.record(iteration, EventTag::SendStart)?;
        self.writer.write(&self.buffer)?;
        self.recorder.record(iteration, EventTag::SendEnd)?;
        self.writer.signal()?;
        trace!(
            position = self.position,
            iteration,
            transform = self.transform.name(),
            "Forwarded message"
        );

        self.pressure.apply(&self.buffer);
        self.completed += 1;
        debug!(position = self.position, iteration, "Relay iteration done");
        Ok(())
    }

    fn finish(self) -> StageResult<StageSummary> {
        let records = self.recorder.records();
        self.recorder.finish()?;
        self.reader.close()?;
        self.writer.close()?;

        Ok(StageSummary {
            position: self.position,
            role: Role::Relay,
            iterations: self.completed,
            records,
            hints_applied: self.pressure.applied(),
            hints_rejected: self.pressure.rejected(),
        })
    }
}
