/*!
 * Pipeline Orchestrator
 * Acquire shared resources, fork one process per stage, join, tear down
 */

use super::process::{join_stage, kill_stages, spawn_stage};
use super::resources::PipelineResources;
use super::types::{failures, OrchestratorError, OrchestratorResult, RunSummary, StageOutcome};
use crate::config::PipelineConfig;
use crate::stage::{stage_main, Doubling, Role, Transform, STAGE_EXIT_FAILED};
use nix::unistd::Pid;
use std::fs;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Runs one N-stage pipeline per `run` call
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: PipelineConfig,
    transform: Arc<dyn Transform>,
}

impl Orchestrator {
    /// Orchestrator applying the doubling transform in every Relay
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            transform: Arc::new(Doubling),
        }
    }

    /// Execute the whole run and return once every stage has terminated
    ///
    /// Forks, so the calling process must be single-threaded.
    pub fn run(&self) -> OrchestratorResult<RunSummary> {
        let config = &self.config;
        config.validate()?;
        fs::create_dir_all(&config.log_dir).map_err(|source| OrchestratorError::LogDir {
            path: config.log_dir.clone(),
            source,
        })?;

        let started = Instant::now();
        let mut resources = PipelineResources::acquire(config)?;
        info!(
            nodes = config.nodes,
            channels = resources.channels(),
            message_bytes = config.message_bytes,
            iterations = config.iterations,
            pressure = ?config.pressure,
            transform = self.transform.name(),
            "Pipeline resources acquired"
        );

        let pids = match self.spawn_all(&mut resources) {
            Ok(pids) => pids,
            Err(e) => {
                if let Err(release) = resources.release() {
                    warn!(error = %release, "Cleanup after spawn failure was incomplete");
                }
                return Err(e);
            }
        };

        // Fail fast: on a join error the names stay linked, since some
        // stage may still hold them.
        let exits = pids
            .iter()
            .enumerate()
            .map(|(position, &pid)| join_stage(position, pid))
            .collect::<OrchestratorResult<Vec<_>>>()?;

        resources.release()?;

        let stages: Vec<StageOutcome> = pids
            .iter()
            .zip(exits)
            .enumerate()
            .map(|(position, (pid, exit))| StageOutcome {
                position,
                role: Role::for_position(position, config.nodes),
                pid: pid.as_raw(),
                exit,
                log_path: config.stage_log_path(position),
            })
            .collect();

        if let Some(err) = failures(&stages) {
            error!(error = %err, "Pipeline run failed");
            return Err(err);
        }

        let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
        info!(nodes = config.nodes, elapsed_ms, "Pipeline run complete");

        Ok(RunSummary {
            nodes: config.nodes,
            iterations: config.iterations,
            message_bytes: config.message_bytes,
            pressure: config.pressure,
            stages,
            elapsed_ms,
        })
    }

    fn spawn_all(&self, resources: &mut PipelineResources) -> OrchestratorResult<Vec<Pid>> {
        let mut pids = Vec::with_capacity(self.config.nodes);

        for position in 0..self.config.nodes {
            let spawned = spawn_stage(position, || match resources.detach_links(position) {
                Ok(links) => stage_main(position, &self.config, links, Arc::clone(&self.transform)),
                Err(e) => {
                    error!(position, error = %e, "Stage could not release foreign channels");
                    STAGE_EXIT_FAILED
                }
            });

            match spawned {
                Ok(pid) => pids.push(pid),
                Err(e) => {
                    error!(position, error = %e, "Spawn failed; killing started stages");
                    kill_stages(&pids);
                    return Err(e);
                }
            }
        }

        Ok(pids)
    }
}
