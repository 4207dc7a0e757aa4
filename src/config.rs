/*!
 * Pipeline Configuration
 *
 * One explicit configuration value, built once before the run starts and
 * handed to the orchestrator and to every stage entry point.
 */

use crate::core::limits::{
    DEFAULT_ITERATIONS, DEFAULT_LOG_DIR, DEFAULT_MESSAGE_BYTES, DEFAULT_NODES, DEFAULT_PERIOD,
    DEFAULT_SEMAPHORE_PREFIX, MAX_SEMAPHORE_NAME, MIN_NODES,
};
use crate::core::types::{Position, Size, WORD_BYTES};
use crate::ipc::semaphore_name;
use crate::memory::PressureMode;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration validation result
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ConfigError {
    #[error("Pipeline needs at least {min} nodes, got {nodes}")]
    #[diagnostic(
        code(config::too_few_nodes),
        help("A pipeline is at minimum a Source and a Sink.")
    )]
    TooFewNodes { nodes: usize, min: usize },

    #[error("Message size {bytes} is not a positive multiple of {word} bytes")]
    #[diagnostic(code(config::message_size))]
    MessageSize { bytes: Size, word: Size },

    #[error("Iteration count must be positive")]
    #[diagnostic(code(config::zero_iterations))]
    ZeroIterations,

    #[error("Invalid semaphore prefix '{0}'")]
    #[diagnostic(
        code(config::semaphore_prefix),
        help("Use a single leading '/' followed by a short name, e.g. /anti_lru_sem.")
    )]
    SemaphorePrefix(String),
}

/// Shape and mode of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of stages, N
    pub nodes: usize,
    /// Size of every message and channel
    pub message_bytes: Size,
    /// Loop passes every stage runs
    pub iterations: u64,
    /// Source sleep before each publish
    #[serde(with = "duration_ms")]
    pub period: Duration,
    pub pressure: PressureMode,
    /// Directory receiving `<position>.log` per stage
    pub log_dir: PathBuf,
    pub semaphore_prefix: String,
    /// Sink checks every slot of every message it receives
    pub verify_payload: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            nodes: DEFAULT_NODES,
            message_bytes: DEFAULT_MESSAGE_BYTES,
            iterations: DEFAULT_ITERATIONS,
            period: DEFAULT_PERIOD,
            pressure: PressureMode::Disabled,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            semaphore_prefix: DEFAULT_SEMAPHORE_PREFIX.to_string(),
            verify_payload: false,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.nodes < MIN_NODES {
            return Err(ConfigError::TooFewNodes {
                nodes: self.nodes,
                min: MIN_NODES,
            });
        }

        if self.message_bytes == 0 || self.message_bytes % WORD_BYTES != 0 {
            return Err(ConfigError::MessageSize {
                bytes: self.message_bytes,
                word: WORD_BYTES,
            });
        }

        if self.iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }

        let prefix = &self.semaphore_prefix;
        let longest = semaphore_name(prefix, self.channels().saturating_sub(1));
        let valid = prefix.len() > 1
            && prefix.starts_with('/')
            && !prefix[1..].contains(['/', '\0'])
            && longest.len() <= MAX_SEMAPHORE_NAME;
        if !valid {
            return Err(ConfigError::SemaphorePrefix(prefix.clone()));
        }

        Ok(())
    }

    /// Number of channels (and semaphores), N - 1
    pub fn channels(&self) -> usize {
        self.nodes.saturating_sub(1)
    }

    /// Words per message
    pub fn words(&self) -> usize {
        self.message_bytes / WORD_BYTES
    }

    pub fn semaphore_name(&self, channel: usize) -> String {
        semaphore_name(&self.semaphore_prefix, channel)
    }

    /// Log file written by the stage at `position`
    pub fn stage_log_path(&self, position: Position) -> PathBuf {
        self.log_dir.join(format!("{}.log", position))
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
