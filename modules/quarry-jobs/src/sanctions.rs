//! Consolidated screening list job.
//!
//! Fetch downloads the published CSV. Process diffs it against the local
//! store by `_id`, yielding only rows not seen before. Update writes the
//! delta to its own file and the merged table back to the store.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use quarry_common::{table, JobConfig, StoreRecovery};
use quarry_engine::{JobHandler, Payload};

use crate::http;

const KEY_COLUMN: &str = "_id";

#[derive(Default)]
pub struct SanctionsJob;

impl SanctionsJob {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl JobHandler for SanctionsJob {
    async fn fetch(&self, config: &JobConfig) -> Result<Payload> {
        let csv_url = config.str("csv_url")?;
        let client = http::client()?;
        let body = http::get_text(&client, csv_url).await?;
        let fetched = table::parse(&body)?;
        info!(rows = fetched.len(), "Fetched screening list");
        Ok(Payload::Table(fetched))
    }

    async fn process(&self, raw: Payload, config: &JobConfig) -> Result<Payload> {
        let Payload::Table(fetched) = raw else {
            return Err(anyhow!("sanctions expects a CSV table"));
        };
        let store_path = config.path("store_path")?;

        let loaded = table::load(&store_path);
        if let Some(StoreRecovery::Corrupt(reason)) = &loaded.recovery {
            warn!(
                path = %store_path.display(),
                reason = reason.as_str(),
                "Existing store unreadable; treating every row as new"
            );
        }

        let delta = table::new_rows(KEY_COLUMN, &loaded.table, &fetched)?;
        Ok(Payload::Table(delta))
    }

    async fn update(&self, processed: Payload, config: &JobConfig) -> Result<()> {
        let Payload::Table(delta) = processed else {
            return Err(anyhow!("sanctions expects a CSV table"));
        };
        let delta_path = config.path("delta_path")?;
        let store_path = config.path("store_path")?;

        table::write(&delta_path, &delta)?;
        info!(
            new_rows = delta.len(),
            path = %delta_path.display(),
            "Wrote screening-list delta"
        );

        let existing = table::load(&store_path).table;
        let merged = table::append(&existing, &delta);
        table::write(&store_path, &merged)?;
        info!(
            total = merged.len(),
            path = %store_path.display(),
            "Screening-list store updated"
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
                    json!(dir.join("csl.csv").to_str().unwrap()),
                ),
                (
                    "delta_path".to_string(),
                    json!(dir.join("csl_new.csv").to_str().unwrap()),
                ),
            ]
            .into_iter()
            .collect(),
        )
    }

    fn fetched() -> quarry_common::Table {
        table::parse("_id,name\n1,Acme\n2,Globex\n").unwrap()
    }

    #[tokio::test]
    async fn first_run_treats_every_row_as_new() {
        let dir = tempfile::tempdir().unwrap();
        let job = SanctionsJob::new();
        let config = config(dir.path());

        let delta = job
            .process(Payload::Table(fetched()), &config)
            .await
            .unwrap();
        let Payload::Table(delta) = delta else {
            panic!("expected table payload");
        };
        assert_eq!(delta.len(), 2);
    }

    #[tokio::test]
    async fn second_run_yields_no_new_rows() {
        let dir = tempfile::tempdir().unwrap();
        let job = SanctionsJob::new();
        let config = config(dir.path());

        let first = job
            .process(Payload::Table(fetched()), &config)
            .await
            .unwrap();
        job.update(first, &config).await.unwrap();

        let second = job
            .process(Payload::Table(fetched()), &config)
            .await
            .unwrap();
        let Payload::Table(second) = second else {
            panic!("expected table payload");
        };
        assert!(second.is_empty());

        // Store holds the merged rows; the delta file only the last batch.
        let store = table::load(&config.path("store_path").unwrap()).table;
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn new_upstream_rows_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let job = SanctionsJob::new();
        let config = config(dir.path());

        let first = job
            .process(Payload::Table(fetched()), &config)
            .await
            .unwrap();
        job.update(first, &config).await.unwrap();

        let grown = table::parse("_id,name\n1,Acme\n2,Globex\n3,Initech\n").unwrap();
        let delta = job
            .process(Payload::Table(grown), &config)
            .await
            .unwrap();
        let Payload::Table(ref rows) = delta else {
            panic!("expected table payload");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.rows[0][1], "Initech");

        job.update(delta, &config).await.unwrap();
        let store = table::load(&config.path("store_path").unwrap()).table;
        assert_eq!(store.len(), 3);
    }
}
