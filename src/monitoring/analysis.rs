/*!
 * Log Analysis
 * Offline verification and latency reporting over a run's stage logs
 *
 * Checks the event-count contract (every role records exactly one pair of
 * each of its phases per iteration) and the cross-stage ordering property
 * (a consumer starts receiving strictly after its producer finished
 * publishing), then derives hop, phase and end-to-end latencies.
 */

use super::recorder::{EventTag, LogRecord};
use crate::core::types::{Iteration, Micros, Position};
use crate::stage::Role;
use miette::Diagnostic;
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Analysis operation result
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Analysis errors
#[derive(Error, Debug, Diagnostic)]
pub enum AnalysisError {
    #[error("Cannot read stage log {path}: {source}")]
    #[diagnostic(code(analysis::read_failed))]
    Read { path: PathBuf, source: io::Error },

    #[error("{path}:{line}: {reason}")]
    #[diagnostic(
        code(analysis::parse_failed),
        help("Lines must read '<iteration> <stage_index> <event_tag> <timestamp_microseconds>'.")
    )]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

type EventIndex = HashMap<(Iteration, EventTag), Micros>;

/// Every record one stage wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageLog {
    pub position: Position,
    pub records: Vec<LogRecord>,
}

impl StageLog {
    pub fn load(path: &Path, position: Position) -> AnalysisResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| AnalysisError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, position, path)
    }

    /// Parse log text; blank lines are skipped
    pub fn parse(text: &str, position: Position, path: &Path) -> AnalysisResult<Self> {
        let records = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                line.parse::<LogRecord>()
                    .map_err(|reason| AnalysisError::Parse {
                        path: path.to_path_buf(),
                        line: i + 1,
                        reason,
                    })
            })
            .collect::<AnalysisResult<Vec<_>>>()?;
        Ok(Self { position, records })
    }

    pub fn count(&self, tag: EventTag) -> u64 {
        self.records.iter().filter(|r| r.tag == tag).count() as u64
    }

    fn index(&self) -> EventIndex {
        self.records
            .iter()
            .map(|r| ((r.iteration, r.tag), r.micros))
            .collect()
    }
}

/// Load `<log_dir>/<position>.log` for every position of an N-stage run
pub fn load_run(log_dir: &Path, nodes: usize) -> AnalysisResult<Vec<StageLog>> {
    (0..nodes)
        .map(|position| StageLog::load(&log_dir.join(format!("{}.log", position)), position))
        .collect()
}

/// A broken contract found in a run's logs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// A role recorded a tag more or fewer times than it ran iterations
    EventCount {
        position: Position,
        tag: EventTag,
        expected: u64,
        actual: u64,
    },
    /// A record in one stage's log claims another stage index
    MisplacedRecord { position: Position, found: Position },
    /// A phase ended before it started
    PhaseInverted {
        position: Position,
        iteration: Iteration,
        start: EventTag,
    },
    /// Consumer began receiving no later than its producer finished sending
    Ordering {
        hop: usize,
        iteration: Iteration,
        send_end: Micros,
        recv_start: Micros,
    },
}

fn expected_tags(role: Role) -> &'static [EventTag] {
    match role {
        Role::Source => &[EventTag::SendStart, EventTag::SendEnd],
        Role::Relay => &EventTag::ALL,
        Role::Sink => &[EventTag::RecvStart, EventTag::RecvEnd],
    }
}

/// Check the event-count and ordering contracts of a complete run
pub fn verify(logs: &[StageLog], iterations: u64) -> Vec<Violation> {
    let nodes = logs.len();
    let mut violations = Vec::new();

    for log in logs {
        let role = Role::for_position(log.position, nodes);
        let expected = expected_tags(role);

        for tag in EventTag::ALL {
            let want = if expected.contains(&tag) { iterations } else { 0 };
            let actual = log.count(tag);
            if actual != want {
                violations.push(Violation::EventCount {
                    position: log.position,
                    tag,
                    expected: want,
                    actual,
                });
            }
        }

        if let Some(stray) = log.records.iter().find(|r| r.position != log.position) {
            violations.push(Violation::MisplacedRecord {
                position: log.position,
                found: stray.position,
            });
        }

        let index = log.index();
        for iteration in 0..iterations {
            for (start, end) in [
                (EventTag::SendStart, EventTag::SendEnd),
                (EventTag::RecvStart, EventTag::RecvEnd),
            ] {
                if let (Some(a), Some(b)) =
                    (index.get(&(iteration, start)), index.get(&(iteration, end)))
                {
                    if b < a {
                        violations.push(Violation::PhaseInverted {
                            position: log.position,
                            iteration,
                            start,
                        });
                    }
                }
            }
        }
    }

    for (hop, pair) in logs.windows(2).enumerate() {
        let producer = pair[0].index();
        let consumer = pair[1].index();
        for iteration in 0..iterations {
            let sent = producer.get(&(iteration, EventTag::SendEnd));
            let received = consumer.get(&(iteration, EventTag::RecvStart));
            if let (Some(&send_end), Some(&recv_start)) = (sent, received) {
                if recv_start <= send_end {
                    violations.push(Violation::Ordering {
                        hop,
                        iteration,
                        send_end,
                        recv_start,
                    });
                }
            }
        }
    }

    violations
}

/// Summary statistics over microsecond samples
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyStats {
    pub samples: usize,
    pub min_us: Micros,
    pub mean_us: f64,
    pub max_us: Micros,
}

impl LatencyStats {
    pub fn from_samples(samples: &[Micros]) -> Option<Self> {
        let min_us = *samples.iter().min()?;
        let max_us = *samples.iter().max()?;
        let total: u128 = samples.iter().map(|&s| s as u128).sum();
        Some(Self {
            samples: samples.len(),
            min_us,
            mean_us: total as f64 / samples.len() as f64,
            max_us,
        })
    }
}

/// Latencies over one producer → consumer edge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HopReport {
    pub hop: usize,
    /// Producer `send_start` to consumer `recv_end`
    pub transfer: Option<LatencyStats>,
    /// Producer `send_end` to consumer `recv_start`
    pub wakeup: Option<LatencyStats>,
}

/// Per-stage copy phase durations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub position: Position,
    pub role: Role,
    /// `send_start` to `send_end`
    pub publish: Option<LatencyStats>,
    /// `recv_start` to `recv_end`
    pub receive: Option<LatencyStats>,
}

/// Full analysis of one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub nodes: usize,
    pub iterations: u64,
    pub stages: Vec<StageReport>,
    pub hops: Vec<HopReport>,
    /// Source `send_start` to Sink `recv_end`
    pub end_to_end: Option<LatencyStats>,
    pub violations: Vec<Violation>,
}

impl RunReport {
    pub fn build(logs: &[StageLog], iterations: u64) -> Self {
        let nodes = logs.len();
        let indexes: Vec<_> = logs.iter().map(StageLog::index).collect();

        let spans = |from: &EventIndex, a: EventTag, to: &EventIndex, b: EventTag| {
            let samples: Vec<Micros> = (0..iterations)
                .filter_map(|k| {
                    let start = from.get(&(k, a))?;
                    let end = to.get(&(k, b))?;
                    Some(end.saturating_sub(*start))
                })
                .collect();
            LatencyStats::from_samples(&samples)
        };

        let stages = logs
            .iter()
            .zip(&indexes)
            .map(|(log, index)| StageReport {
                position: log.position,
                role: Role::for_position(log.position, nodes),
                publish: spans(index, EventTag::SendStart, index, EventTag::SendEnd),
                receive: spans(index, EventTag::RecvStart, index, EventTag::RecvEnd),
            })
            .collect();

        let hops = indexes
            .windows(2)
            .enumerate()
            .map(|(hop, pair)| HopReport {
                hop,
                transfer: spans(&pair[0], EventTag::SendStart, &pair[1], EventTag::RecvEnd),
                wakeup: spans(&pair[0], EventTag::SendEnd, &pair[1], EventTag::RecvStart),
            })
            .collect();

        let end_to_end = match (indexes.first(), indexes.last()) {
            (Some(source), Some(sink)) if nodes >= 2 => {
                spans(source, EventTag::SendStart, sink, EventTag::RecvEnd)
            }
            _ => None,
        };

        Self {
            nodes,
            iterations,
            stages,
            hops,
            end_to_end,
            violations: verify(logs, iterations),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}
