//! Single-job execution.
//!
//! Runs the three stages strictly in order, feeding each stage's output to
//! the next along with the job's composed config. Any stage error is caught
//! here, logged with the full error chain, and reported as a failed outcome;
//! it never propagates to the orchestrator or other jobs.

use anyhow::{anyhow, Result};
use tracing::{error, info};

use quarry_common::JobConfig;

use crate::registry::HandlerRegistry;

/// One job, ready to run: name, handler binding, and composed config.
#[derive(Clone)]
pub struct PreparedJob {
    pub name: String,
    pub handler: String,
    pub config: JobConfig,
}

/// Terminal state of one job within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed { error: String },
}

#[derive(Debug, Clone)]
pub struct JobResult {
    pub name: String,
    pub outcome: JobOutcome,
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Succeeded)
    }
}

/// Run one job to completion. Never fails: stage errors become a
/// [`JobOutcome::Failed`] and the caller moves on.
pub async fn run_job(registry: &HandlerRegistry, job: &PreparedJob) -> JobResult {
    info!(job = job.name.as_str(), "Running job");
    let outcome = match execute(registry, job).await {
        Ok(()) => JobOutcome::Succeeded,
        Err(err) => {
            error!(job = job.name.as_str(), error = %err, "Job failed");
            JobOutcome::Failed {
                error: format!("{err:#}"),
            }
        }
    };
    JobResult {
        name: job.name.clone(),
        outcome,
    }
}

async fn execute(registry: &HandlerRegistry, job: &PreparedJob) -> Result<()> {
    let handler = registry
        .get(&job.handler)
        .ok_or_else(|| anyhow!("unknown handler '{}'", job.handler))?;

    let raw = handler.fetch(&job.config).await?;
    info!(job = job.name.as_str(), "Fetched raw data");

    let processed = handler.process(raw, &job.config).await?;
    let items = processed
        .item_count()
        .map(|n| n.to_string())
        .unwrap_or_else(|| "N/A".to_string());
    info!(
        job = job.name.as_str(),
        items = items.as_str(),
        "Processed data"
    );

    handler.update(processed, &job.config).await?;
    info!(job = job.name.as_str(), "Updated local store");
    Ok(())
}
