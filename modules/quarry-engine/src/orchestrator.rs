//! The run loop.
//!
//! Composes every job's config up front, resolves the execution order, then
//! drives each job sequentially. Jobs run strictly one at a time: later jobs
//! may consume files written by earlier ones, so the filesystem is the only
//! channel between them and no two jobs ever touch the same store at once.

use anyhow::{anyhow, Result};
use tracing::info;

use quarry_common::JobConfig;

use crate::plan::RunPlan;
use crate::registry::HandlerRegistry;
use crate::resolver;
use crate::runner::{self, JobResult, PreparedJob};

/// Per-job outcomes for one complete run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub results: Vec<JobResult>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Drives a run plan to completion, best effort: individual job failures are
/// recorded, never propagated. Only an unresolvable dependency graph aborts
/// a run, and it does so before any job has executed.
pub struct Orchestrator {
    registry: HandlerRegistry,
}

impl Orchestrator {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self { registry }
    }

    pub async fn run(&self, plan: &RunPlan) -> Result<RunReport> {
        plan.validate()?;
        let ordered = resolver::resolve(&plan.jobs)?;

        let order: Vec<&str> = ordered.iter().map(|job| job.name.as_str()).collect();
        let order_line = order.join(" -> ");
        info!(order = order_line.as_str(), "Jobs will run in the following order");

        // Immutable per-job configs, composed before anything executes.
        let prepared: Vec<PreparedJob> = ordered
            .iter()
            .map(|spec| PreparedJob {
                name: spec.name.clone(),
                handler: spec.handler_name().to_string(),
                config: JobConfig::compose(&plan.global, &spec.config),
            })
            .collect();

        let mut report = RunReport::default();
        for job in &prepared {
            report.results.push(runner::run_job(&self.registry, job).await);
        }

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Run complete"
        );
        Ok(report)
    }

    /// Run a single job by name, ignoring dependency order. Used to exercise
    /// one job's stages in isolation against a plan.
    pub async fn run_single(&self, plan: &RunPlan, name: &str) -> Result<JobResult> {
        let spec = plan
            .job(name)
            .ok_or_else(|| anyhow!("no job named '{name}' in plan"))?;
        let job = PreparedJob {
            name: spec.name.clone(),
            handler: spec.handler_name().to_string(),
            config: JobConfig::compose(&plan.global, &spec.config),
        };
        Ok(runner::run_job(&self.registry, &job).await)
    }
}
