/*!
 * Sink Stage
 * Terminal consumer; optionally checks every message it receives
 */

use super::role::{Role, StageRuntime};
use super::transform::{expected_after, Transform};
use super::types::{StageError, StageResult, StageSummary};
use crate::config::PipelineConfig;
use crate::core::limits::SOURCE_FILL;
use crate::core::types::{Iteration, Position, Word};
use crate::ipc::{ChannelReader, Link};
use crate::memory::{PressureHook, PrivateBuffer};
use crate::monitoring::{EventTag, TimestampRecorder};
use std::fs::File;
use std::io::{BufWriter, Write};
use tracing::{debug, trace};

/// Position N-1 of the chain
#[derive(Debug)]
pub struct Sink<W: Write = BufWriter<File>> {
    position: Position,
    reader: ChannelReader,
    buffer: PrivateBuffer,
    /// Value every slot must hold, when payload checking is on
    expected: Option<Word>,
    recorder: TimestampRecorder<W>,
    pressure: PressureHook,
    completed: u64,
}

impl<W: Write> Sink<W> {
    pub fn init(
        config: &PipelineConfig,
        position: Position,
        upstream: Link,
        transform: &dyn Transform,
        recorder: TimestampRecorder<W>,
    ) -> StageResult<Self> {
        let reader = ChannelReader::open(upstream)?;
        let buffer = PrivateBuffer::zeroed(config.message_bytes)?;

        let relays = config.nodes.saturating_sub(2);
        let expected = config
            .verify_payload
            .then(|| expected_after(transform, SOURCE_FILL, relays));

        Ok(Self {
            position,
            reader,
            buffer,
            expected,
            recorder,
            pressure: PressureHook::new(config.pressure, position),
            completed: 0,
        })
    }

    fn check_payload(&self, iteration: Iteration) -> StageResult<()> {
        let Some(expected) = self.expected else {
            return Ok(());
        };

        match self.buffer.iter().position(|&w| w != expected) {
            None => Ok(()),
            Some(slot) => Err(StageError::PayloadMismatch {
                iteration,
                slot,
                expected,
                actual: self.buffer[slot],
            }),
        }
    }
}

impl<W: Write> StageRuntime for Sink<W> {
    fn position(&self) -> Position {
        self.position
    }

    fn role(&self) -> Role {
        Role::Sink
    }

    fn run_iteration(&mut self, iteration: Iteration) -> StageResult<()> {
        self.reader.wait()?;

        self.recorder.record(iteration, EventTag::RecvStart)?;
        self.reader.read_into(&mut self.buffer)?;
        self.recorder.record(iteration, EventTag::RecvEnd)?;
        trace!(position = self.position, iteration, "Received message");

        self.check_payload(iteration)?;

        self.pressure.apply(&self.buffer);
        self.completed += 1;
        debug!(position = self.position, iteration, "Sink iteration done");
        Ok(())
    }

    fn finish(self) -> StageResult<StageSummary> {
        let records = self.recorder.records();
        self.recorder.finish()?;
        self.reader.close()?;

        Ok(StageSummary {
            position: self.position,
            role: Role::Sink,
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
    use crate::stage::transform::Doubling;

    struct Fixture {
        name: String,
        ready: NamedSemaphore,
        channel: SharedChannel,
    }

    impl Fixture {
        fn new(tag: &str, bytes: usize) -> Self {
            let name = format!("/anti_lru_unit_{}_sink_{}", std::process::id(), tag);
            let _ = NamedSemaphore::unlink(&name);
            let (ready, _) = NamedSemaphore::acquire(&name, SEMAPHORE_MODE).unwrap();
            let channel = SharedChannel::map(2, bytes).unwrap();
            Self {
                name,
                ready,
                channel,
            }
        }

        fn link(&self) -> Link {
            Link {
                // SAFETY: the fixture outlives every sink built from it.
                channel: unsafe { self.channel.borrowed_view() },
                semaphore: self.name.clone(),
            }
        }

        fn deliver(&mut self, value: Word) {
            let words = self.channel.words();
            self.channel.write(&vec![value; words]).unwrap();
            self.ready.post().unwrap();
        }

        fn teardown(self) {
            self.ready.close().unwrap();
            NamedSemaphore::unlink(&self.name).unwrap();
        }
    }

    fn config(verify_payload: bool) -> PipelineConfig {
        PipelineConfig {
            nodes: 3,
            message_bytes: 4096,
            verify_payload,
            ..Default::default()
        }
    }

    #[test]
    fn test_sink_accepts_expected_payload() {
        let mut fixture = Fixture::new("ok", 4096);
        let mut sink = Sink::init(
            &config(true),
            2,
            fixture.link(),
            &Doubling,
            TimestampRecorder::new(Vec::new(), 2),
        )
        .unwrap();

        // One relay between Source and Sink: 1 doubled once.
        fixture.deliver(2);
        sink.run_iteration(0).unwrap();

        let summary = sink.finish().unwrap();
        assert_eq!(summary.role, Role::Sink);
        assert_eq!(summary.records, 2);
        fixture.teardown();
    }

    #[test]
    fn test_sink_reports_payload_mismatch() {
        let mut fixture = Fixture::new("bad", 4096);
        let mut sink = Sink::init(
            &config(true),
            2,
            fixture.link(),
            &Doubling,
            TimestampRecorder::new(Vec::new(), 2),
        )
        .unwrap();

        fixture.deliver(1);
        let err = sink.run_iteration(4).unwrap_err();
        assert!(matches!(
            err,
            StageError::PayloadMismatch {
                iteration: 4,
                slot: 0,
                expected: 2,
                actual: 1,
            }
        ));
        drop(sink);
        fixture.teardown();
    }

    #[test]
    fn test_sink_without_verification_accepts_anything() {
        let mut fixture = Fixture::new("any", 4096);
        let mut sink = Sink::init(
            &config(false),
            2,
            fixture.link(),
            &Doubling,
            TimestampRecorder::new(Vec::new(), 2),
        )
        .unwrap();

        fixture.deliver(12345);
        sink.run_iteration(0).unwrap();
        assert_eq!(sink.finish().unwrap().iterations, 1);
        fixture.teardown();
    }
}
