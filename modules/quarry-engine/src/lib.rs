//! Job orchestration engine.
//!
//! A run plan names a set of jobs, each a fetch → process → update pipeline
//! bound to a registered [`JobHandler`]. The resolver computes a dependency-
//! respecting execution order, and the orchestrator drives each job in turn,
//! isolating failures per job so one broken source never blocks the rest.

pub mod orchestrator;
pub mod plan;
pub mod registry;
pub mod resolver;
pub mod runner;
pub mod traits;

pub use orchestrator::{Orchestrator, RunReport};
pub use plan::{JobSpec, RunPlan};
pub use registry::HandlerRegistry;
pub use resolver::ScheduleError;
pub use runner::{JobOutcome, JobResult};
pub use traits::{JobHandler, Payload};
