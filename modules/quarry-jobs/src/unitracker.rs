//! University risk-tracker job.
//!
//! The tracker site is rendered by a headless-browser scraper outside this
//! crate; the handler consumes the JSON dataset it publishes. Update merges
//! by `permalink` into the main store and writes the newly added entries to
//! a separate delta file for the downstream search agent.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use quarry_common::{store, JobConfig, Record, StoreRecovery};
use quarry_engine::{JobHandler, Payload};

use crate::http;

#[derive(Default)]
pub struct UnitrackerJob;

impl UnitrackerJob {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl JobHandler for UnitrackerJob {
    async fn fetch(&self, config: &JobConfig) -> Result<Payload> {
        let source_url = config.str("source_url")?;
        let client = http::client()?;
        let data = http::get_json(&client, source_url).await?;
        if !data.is_array() {
            return Err(anyhow!("tracker dataset at {source_url} is not a JSON array"));
        }
        Ok(Payload::Json(data))
    }

    async fn process(&self, raw: Payload, _config: &JobConfig) -> Result<Payload> {
        // The tracker dataset is already in record shape.
        Ok(raw)
    }

    async fn update(&self, processed: Payload, config: &JobConfig) -> Result<()> {
        let Payload::Json(Value::Array(entries)) = processed else {
            return Err(anyhow!("unitracker expects a JSON array"));
        };
        let store_path = config.path("store_path")?;
        let delta_path = config.path("delta_path")?;

        let loaded = store::load(&store_path);
        if let Some(StoreRecovery::Corrupt(reason)) = &loaded.recovery {
            warn!(
                path = %store_path.display(),
                reason = reason.as_str(),
                "Existing store unreadable; starting from empty"
            );
        }

        let candidates: Vec<Record> = entries
            .into_iter()
            .filter_map(|entry| match entry {
                Value::Object(obj) => Some(obj),
                _ => None,
            })
            .collect();
        let new_entries = store::merge_new("permalink", &loaded.records, &candidates);

        if new_entries.is_empty() {
            info!("No new university entries found");
            return Ok(());
        }

        let mut merged = loaded.records;
        merged.extend(new_entries.iter().cloned());
        store::write(&store_path, &merged)?;
        store::write(&delta_path, &new_entries)?;
        info!(
            added = new_entries.len(),
            total = merged.len(),
            path = %store_path.display(),
            "University store updated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(dir: &std::path::Path) -> JobConfig {
        JobConfig::from_values(
            [
                (
                    "store_path".to_string(),
                    json!(dir.join("universities.json").to_str().unwrap()),
                ),
                (
                    "delta_path".to_string(),
                    json!(dir.join("universities_added.json").to_str().unwrap()),
                ),
            ]
            .into_iter()
            .collect(),
        )
    }

    #[tokio::test]
    async fn update_merges_by_permalink_and_writes_delta() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let job = UnitrackerJob::new();

        let first = Payload::Json(json!([
            {"permalink": "/uni/a", "title": "A"},
        ]));
        job.update(first, &config).await.unwrap();

        let second = Payload::Json(json!([
            {"permalink": "/uni/a", "title": "A"},
            {"permalink": "/uni/b", "title": "B"},
        ]));
        job.update(second, &config).await.unwrap();

        let store_path = config.path("store_path").unwrap();
        let delta_path = config.path("delta_path").unwrap();

        assert_eq!(store::load(&store_path).records.len(), 2);

        // Delta holds only the latest batch of additions.
        let delta = store::load(&delta_path).records;
        assert_eq!(delta.len(), 1);
        assert_eq!(delta[0]["permalink"], json!("/uni/b"));
    }

    #[tokio::test]
    async fn no_new_entries_leaves_files_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let job = UnitrackerJob::new();

        let batch = || Payload::Json(json!([{"permalink": "/uni/a"}]));
        job.update(batch(), &config).await.unwrap();

        let delta_path = config.path("delta_path").unwrap();
        let first_delta = store::load(&delta_path).records;
        assert_eq!(first_delta.len(), 1);

        job.update(batch(), &config).await.unwrap();
        // Second run found nothing new; delta file still holds the old batch.
        assert_eq!(store::load(&delta_path).records, first_delta);
    }
}
