//! Dependency resolution.
//!
//! Kahn's algorithm over the job graph. The queue is seeded in plan order
//! and drained FIFO, so ties among independent jobs are broken by their
//! position in the plan — the order is deterministic for a given plan.
//!
//! A dependency on an unknown job name is logged and ignored (the edge is
//! simply not added); the job still runs. A cycle, by contrast, is fatal:
//! no total order exists, so the run aborts before any job executes.

use std::collections::{HashMap, VecDeque};

use thiserror::Error;
use tracing::warn;

use crate::plan::JobSpec;

#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The graph has a cycle (or an unresolvable chain), so fewer jobs were
    /// ordered than exist in the plan.
    #[error("cycle detected among jobs; could not order {unordered} of {total} jobs")]
    Unresolvable { unordered: usize, total: usize },
}

/// Compute an execution order in which every dependency precedes its
/// dependents.
pub fn resolve(jobs: &[JobSpec]) -> Result<Vec<&JobSpec>, ScheduleError> {
    let by_name: HashMap<&str, &JobSpec> =
        jobs.iter().map(|job| (job.name.as_str(), job)).collect();

    let mut indegree: HashMap<&str, usize> =
        jobs.iter().map(|job| (job.name.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> =
        jobs.iter().map(|job| (job.name.as_str(), Vec::new())).collect();

    for job in jobs {
        for dep in &job.depends_on {
            if by_name.contains_key(dep.as_str()) {
                if let Some(list) = dependents.get_mut(dep.as_str()) {
                    list.push(job.name.as_str());
                }
                if let Some(degree) = indegree.get_mut(job.name.as_str()) {
                    *degree += 1;
                }
            } else {
                warn!(
                    job = job.name.as_str(),
                    dependency = dep.as_str(),
                    "Job depends on unknown job; ignoring the edge"
                );
            }
        }
    }

    // Seed with zero-indegree jobs in plan order for determinism.
    let mut queue: VecDeque<&str> = jobs
        .iter()
        .map(|job| job.name.as_str())
        .filter(|name| indegree[name] == 0)
        .collect();

    let mut ordered: Vec<&JobSpec> = Vec::with_capacity(jobs.len());
    while let Some(current) = queue.pop_front() {
        ordered.push(by_name[current]);
        for dependent in dependents[current].iter().copied() {
            if let Some(degree) = indegree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(dependent);
                }
            }
        }
    }

    if ordered.len() != jobs.len() {
        return Err(ScheduleError::Unresolvable {
            unordered: jobs.len() - ordered.len(),
            total: jobs.len(),
        });
    }
    Ok(ordered)
}
