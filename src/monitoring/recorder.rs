/*!
 * Timestamp Recorder
 *
 * Append-only per-stage measurement log. Every line is
 * `<iteration> <stage_index> <event_tag> <timestamp_microseconds>`, the
 * format offline analysis consumes. Lines are buffered and flushed when the
 * stage finishes; a crashed stage may leave a partial log.
 */

use crate::core::types::{Iteration, Micros, Position};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Recorder operation result
pub type RecorderResult<T> = Result<T, RecorderError>;

/// Recorder errors
#[derive(Error, Debug, Diagnostic)]
pub enum RecorderError {
    #[error("Cannot open log file {path}: {source}")]
    #[diagnostic(
        code(recorder::open_failed),
        help("Check that the log directory exists and is writable.")
    )]
    Open { path: PathBuf, source: io::Error },

    #[error("Cannot write log record for stage {position}: {source}")]
    #[diagnostic(code(recorder::write_failed))]
    Write { position: Position, source: io::Error },
}

/// Phase boundary being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTag {
    SendStart,
    SendEnd,
    RecvStart,
    RecvEnd,
}

impl EventTag {
    pub const ALL: [EventTag; 4] = [
        EventTag::SendStart,
        EventTag::SendEnd,
        EventTag::RecvStart,
        EventTag::RecvEnd,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventTag::SendStart => "send_start",
            EventTag::SendEnd => "send_end",
            EventTag::RecvStart => "recv_start",
            EventTag::RecvEnd => "recv_end",
        }
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| format!("unknown event tag '{}'", s))
    }
}

/// One measurement line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub iteration: Iteration,
    pub position: Position,
    pub tag: EventTag,
    pub micros: Micros,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.iteration, self.position, self.tag, self.micros
        )
    }
}

impl FromStr for LogRecord {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [iteration, position, tag, micros] = fields[..] else {
            return Err(format!("expected 4 fields, found {}", fields.len()));
        };

        Ok(Self {
            iteration: iteration
                .parse()
                .map_err(|e| format!("bad iteration '{}': {}", iteration, e))?,
            position: position
                .parse()
                .map_err(|e| format!("bad stage index '{}': {}", position, e))?,
            tag: tag.parse()?,
            micros: micros
                .parse()
                .map_err(|e| format!("bad timestamp '{}': {}", micros, e))?,
        })
    }
}

/// Wall-clock microseconds since the Unix epoch
#[inline]
pub fn now_micros() -> Micros {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as Micros)
        .unwrap_or_default()
}

/// Per-stage append-only event log
#[derive(Debug)]
pub struct TimestampRecorder<W: Write = BufWriter<File>> {
    position: Position,
    sink: W,
    records: u64,
}

impl TimestampRecorder {
    /// Open (or append to) the stage's log file
    pub fn open(path: &Path, position: Position) -> RecorderResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| RecorderError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::new(BufWriter::new(file), position))
    }
}

impl<W: Write> TimestampRecorder<W> {
    pub fn new(sink: W, position: Position) -> Self {
        Self {
            position,
            sink,
            records: 0,
        }
    }

    /// Number of records written so far
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Stamp `tag` for `iteration` with the current wall-clock time
    #[inline]
    pub fn record(&mut self, iteration: Iteration, tag: EventTag) -> RecorderResult<Micros> {
        let micros = now_micros();
        self.record_at(iteration, tag, micros)?;
        Ok(micros)
    }

    pub fn record_at(
        &mut self,
        iteration: Iteration,
        tag: EventTag,
        micros: Micros,
    ) -> RecorderResult<()> {
        let record = LogRecord {
            iteration,
            position: self.position,
            tag,
            micros,
        };
        writeln!(self.sink, "{}", record).map_err(|source| RecorderError::Write {
            position: self.position,
            source,
        })?;
        self.records += 1;
        Ok(())
    }

    /// Flush everything recorded and hand back the sink
    pub fn finish(mut self) -> RecorderResult<W> {
        self.sink.flush().map_err(|source| RecorderError::Write {
            position: self.position,
            source,
        })?;
        Ok(self.sink)
    }
}
