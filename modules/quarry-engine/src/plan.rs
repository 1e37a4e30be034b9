//! The run plan document.
//!
//! A JSON file listing the jobs to run, their handler bindings, per-job
//! config, dependencies, and an optional `global` map merged into every
//! job's config (per-job values win).

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

/// One job entry in the plan.
#[derive(Debug, Clone, Deserialize)]
pub struct JobSpec {
    /// Unique job name; also the node name in the dependency graph.
    pub name: String,
    /// Registered handler this job binds to. Defaults to the job name.
    #[serde(default)]
    pub handler: Option<String>,
    #[serde(default)]
    pub config: BTreeMap<String, Value>,
    /// Names of jobs that must run before this one.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl JobSpec {
    /// The handler name this job resolves to.
    pub fn handler_name(&self) -> &str {
        self.handler.as_deref().unwrap_or(&self.name)
    }
}

/// The full plan: jobs plus the plan-wide global config map.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunPlan {
    #[serde(default)]
    pub jobs: Vec<JobSpec>,
    #[serde(default)]
    pub global: BTreeMap<String, Value>,
}

impl RunPlan {
    /// Load and validate a plan file. A plan that cannot be read, parsed,
    /// or validated is fatal: there is nothing to run.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan file {}", path.display()))?;
        let plan: RunPlan = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse plan file {}", path.display()))?;
        plan.validate()?;
        Ok(plan)
    }

    /// Job names must be unique; everything else is checked at run time.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for job in &self.jobs {
            if !seen.insert(job.name.as_str()) {
                bail!("duplicate job name in plan: '{}'", job.name);
            }
        }
        Ok(())
    }

    pub fn job(&self, name: &str) -> Option<&JobSpec> {
        self.jobs.iter().find(|job| job.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_plan() {
        let plan: RunPlan = serde_json::from_str(
            r#"{
                "jobs": [
                    {"name": "sanctions", "config": {"csv_url": "https://example.org/csl.csv"}},
                    {"name": "sanction_entities", "depends_on": ["sanctions"]}
                ],
                "global": {"data_dir": "data"}
            }"#,
        )
        .unwrap();

        assert_eq!(plan.jobs.len(), 2);
        assert_eq!(plan.jobs[0].handler_name(), "sanctions");
        assert_eq!(plan.jobs[1].depends_on, vec!["sanctions"]);
        assert!(plan.global.contains_key("data_dir"));
        plan.validate().unwrap();
    }

    #[test]
    fn handler_field_overrides_name() {
        let plan: RunPlan = serde_json::from_str(
            r#"{"jobs": [{"name": "sanctions_eu", "handler": "sanctions"}]}"#,
        )
        .unwrap();
        assert_eq!(plan.jobs[0].handler_name(), "sanctions");
    }

    #[test]
    fn duplicate_names_fail_validation() {
        let plan: RunPlan =
            serde_json::from_str(r#"{"jobs": [{"name": "a"}, {"name": "a"}]}"#).unwrap();
        assert!(plan.validate().is_err());
    }
}
