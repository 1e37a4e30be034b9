//! Per-job configuration.
//!
//! Each job receives one immutable [`JobConfig`], composed from the plan's
//! `global` map and the job's own `config` map before the run starts.
//! Per-job values win over global ones. Secrets (API keys) stay as env
//! vars and are never part of a job config.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::Value;

use crate::error::ConfigError;

/// Immutable string-keyed configuration for a single job.
#[derive(Debug, Clone, Default)]
pub struct JobConfig {
    values: BTreeMap<String, Value>,
}

impl JobConfig {
    /// Compose a job config from the plan-wide global map and the job's own
    /// map. The job's explicit values take precedence; global fills gaps.
    pub fn compose(global: &BTreeMap<String, Value>, local: &BTreeMap<String, Value>) -> Self {
        let mut values = global.clone();
        for (key, val) in local {
            values.insert(key.clone(), val.clone());
        }
        Self { values }
    }

    /// Build a config directly from key/value pairs (tests, single-job runs).
    pub fn from_values(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    /// Raw access for keys whose shape only the handler understands.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Required string value.
    pub fn str(&self, key: &str) -> Result<&str, ConfigError> {
        match self.values.get(key) {
            None => Err(ConfigError::missing(key)),
            Some(v) => v.as_str().ok_or_else(|| ConfigError::invalid(key, "string")),
        }
    }

    /// Optional string value. Wrong-typed values read as absent.
    pub fn opt_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Required filesystem path.
    pub fn path(&self, key: &str) -> Result<PathBuf, ConfigError> {
        Ok(PathBuf::from(self.str(key)?))
    }

    /// Required unsigned integer.
    pub fn u64(&self, key: &str) -> Result<u64, ConfigError> {
        match self.values.get(key) {
            None => Err(ConfigError::missing(key)),
            Some(v) => v
                .as_u64()
                .ok_or_else(|| ConfigError::invalid(key, "unsigned integer")),
        }
    }

    /// Required list of strings.
    pub fn str_list(&self, key: &str) -> Result<Vec<String>, ConfigError> {
        let items = match self.values.get(key) {
            None => return Err(ConfigError::missing(key)),
            Some(v) => v
                .as_array()
                .ok_or_else(|| ConfigError::invalid(key, "array of strings"))?,
        };
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ConfigError::invalid(key, "array of strings"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn local_wins_over_global() {
        let global = map(&[("start_date", json!("2020-01-01")), ("pagesize", json!(50))]);
        let local = map(&[("start_date", json!("2024-06-01"))]);

        let config = JobConfig::compose(&global, &local);
        assert_eq!(config.str("start_date").unwrap(), "2024-06-01");
        assert_eq!(config.u64("pagesize").unwrap(), 50);
    }

    #[test]
    fn global_fills_missing_keys() {
        let global = map(&[("output_file", json!("data/out.json"))]);
        let config = JobConfig::compose(&global, &BTreeMap::new());
        assert_eq!(
            config.path("output_file").unwrap(),
            PathBuf::from("data/out.json")
        );
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let config = JobConfig::default();
        assert!(matches!(
            config.str("nope"),
            Err(ConfigError::MissingKey { .. })
        ));
    }

    #[test]
    fn wrong_type_is_a_config_error() {
        let config = JobConfig::from_values(map(&[("keywords", json!("not-a-list"))]));
        assert!(matches!(
            config.str_list("keywords"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn str_list_round_trips() {
        let config = JobConfig::from_values(map(&[("keywords", json!(["china", "iran"]))]));
        assert_eq!(config.str_list("keywords").unwrap(), vec!["china", "iran"]);
    }
}
