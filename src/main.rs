/*!
 * anti-lru - Main Entry Point
 *
 * Runs one N-stage shared-memory pipeline:
 * - Source paces and publishes a constant message
 * - Relays receive, double and forward it
 * - Sink receives it
 *
 * Each stage writes `<log_dir>/<position>.log`. With `--summary` the logs are
 * analysed after the run and a JSON report is printed on stdout.
 */

use anti_lru::core::limits::{
    DEFAULT_ITERATIONS, DEFAULT_LOG_DIR, DEFAULT_MESSAGE_BYTES, DEFAULT_NODES, DEFAULT_PERIOD,
    DEFAULT_SEMAPHORE_PREFIX,
};
use anti_lru::{
    init_tracing, load_run, HarnessResult, Orchestrator, PipelineConfig, PressureMode, RunReport,
    RunSummary,
};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Memory-pressure mode selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Mark each consumed buffer cold (MADV_COLD)
    Cold,
    /// Reclaim each consumed buffer immediately (MADV_PAGEOUT)
    Pageout,
}

impl From<Mode> for PressureMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Cold => PressureMode::Cold,
            Mode::Pageout => PressureMode::Pageout,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "anti-lru", version, about = "Shared-memory pipeline latency harness")]
struct Cli {
    /// Eviction hint applied after each iteration; omit to disable
    #[arg(value_enum)]
    mode: Option<Mode>,

    /// Number of stages (at least 2)
    #[arg(long, env = "ANTI_LRU_NODES", default_value_t = DEFAULT_NODES)]
    nodes: usize,

    /// Loop passes run by every stage
    #[arg(long, env = "ANTI_LRU_ITERATIONS", default_value_t = DEFAULT_ITERATIONS)]
    iterations: u64,

    /// Message and channel size in bytes
    #[arg(long, env = "ANTI_LRU_MESSAGE_BYTES", default_value_t = DEFAULT_MESSAGE_BYTES)]
    message_bytes: usize,

    /// Source pacing interval in milliseconds
    #[arg(long, env = "ANTI_LRU_PERIOD_MS", default_value_t = DEFAULT_PERIOD.as_millis() as u64)]
    period_ms: u64,

    /// Directory receiving one log file per stage
    #[arg(long, env = "ANTI_LRU_LOG_DIR", default_value = DEFAULT_LOG_DIR)]
    log_dir: PathBuf,

    /// Semaphore name prefix; the channel index is appended
    #[arg(long, env = "ANTI_LRU_SEM_PREFIX", default_value = DEFAULT_SEMAPHORE_PREFIX)]
    semaphore_prefix: String,

    /// Have the Sink check every slot of every message
    #[arg(long)]
    verify: bool,

    /// Analyse the logs after the run and print a JSON report
    #[arg(long)]
    summary: bool,
}

impl Cli {
    fn config(&self) -> PipelineConfig {
        PipelineConfig {
            nodes: self.nodes,
            message_bytes: self.message_bytes,
            iterations: self.iterations,
            period: Duration::from_millis(self.period_ms),
            pressure: self.mode.map(PressureMode::from).unwrap_or_default(),
            log_dir: self.log_dir.clone(),
            semaphore_prefix: self.semaphore_prefix.clone(),
            verify_payload: self.verify,
        }
    }
}

#[derive(Serialize)]
struct SummaryOutput<'a> {
    run: &'a RunSummary,
    analysis: &'a RunReport,
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing();
    run(&cli)?;
    Ok(())
}

fn run(cli: &Cli) -> HarnessResult<()> {
    let config = cli.config();
    info!(
        nodes = config.nodes,
        iterations = config.iterations,
        pressure = ?config.pressure,
        log_dir = %config.log_dir.display(),
        "anti-lru starting"
    );

    let summary = Orchestrator::new(config.clone()).run()?;

    if cli.summary {
        let logs = load_run(&config.log_dir, config.nodes)?;
        let analysis = RunReport::build(&logs, config.iterations);
        if !analysis.is_clean() {
            warn!(
                violations = analysis.violations.len(),
                "Stage logs break the event contract"
            );
        }

        let output = SummaryOutput {
            run: &summary,
            analysis: &analysis,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    Ok(())
}
