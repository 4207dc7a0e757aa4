/*!
 * Monitoring Module
 * Timestamp recording, offline log analysis and diagnostic tracing
 */

pub mod analysis;
pub mod recorder;
pub mod tracer;

// Re-export for convenience
pub use analysis::{
    load_run, verify, AnalysisError, AnalysisResult, HopReport, LatencyStats, RunReport,
    StageLog, StageReport, Violation,
};
pub use recorder::{
    now_micros, EventTag, LogRecord, RecorderError, RecorderResult, TimestampRecorder,
};
pub use tracer::init_tracing;
