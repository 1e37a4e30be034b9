//! Sanction-entity conversion job.
//!
//! Reads the screening-list CSV produced by the sanctions job and converts
//! each row into a searchable entity record: `Names` (name plus alternate
//! names), `Resource` (source list, with URL when published), and `Address`
//! when present. The shipped plan declares a dependency on the sanctions
//! job, so the CSV exists by the time this runs.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use quarry_common::{store, table, JobConfig, Record, StoreRecovery, Table};
use quarry_engine::{JobHandler, Payload};

pub struct SanctionEntitiesJob;

#[async_trait]
impl JobHandler for SanctionEntitiesJob {
    async fn fetch(&self, config: &JobConfig) -> Result<Payload> {
        let input = config.path("input_csv_path")?;
        // Strict read: an absent input means the upstream job has not run.
        let data = table::read(&input)
            .with_context(|| "screening list not found; run the sanctions job first")?;
        Ok(Payload::Table(data))
    }

    async fn process(&self, raw: Payload, _config: &JobConfig) -> Result<Payload> {
        let Payload::Table(data) = raw else {
            return Err(anyhow!("sanction_entities expects a CSV table"));
        };
        let entities: Vec<Value> = convert_rows(&data)
            .into_iter()
            .map(Value::Object)
            .collect();
        Ok(Payload::Json(Value::Array(entities)))
    }

    async fn update(&self, processed: Payload, config: &JobConfig) -> Result<()> {
        let Payload::Json(Value::Array(entities)) = processed else {
            return Err(anyhow!("sanction_entities expects a JSON array"));
        };
        let output_file = config.path("output_file")?;

        let loaded = store::load(&output_file);
        if let Some(StoreRecovery::Corrupt(reason)) = &loaded.recovery {
            warn!(
                path = %output_file.display(),
                reason = reason.as_str(),
                "Existing store unreadable; starting from empty"
            );
        }

        let candidates: Vec<Record> = entities
            .into_iter()
            .filter_map(|entity| match entity {
                Value::Object(obj) => Some(obj),
                _ => None,
            })
            .collect();
        let new_entries = store::merge_new("Names", &loaded.records, &candidates);

        let mut merged = loaded.records;
        let added = new_entries.len();
        merged.extend(new_entries);
        store::write(&output_file, &merged)?;

        info!(
            added,
            total = merged.len(),
            path = %output_file.display(),
            "Entity store updated"
        );
        Ok(())
    }
}

/// A cell that carries no information: empty, or a spreadsheet NaN artifact.
fn blank(cell: &str) -> bool {
    cell.trim().is_empty() || cell.trim().eq_ignore_ascii_case("nan")
}

/// Non-blank cell value for a named column, trimmed.
fn filled<'a>(data: &Table, row: &'a [String], column: &str) -> Option<&'a str> {
    data.cell(row, column)
        .map(str::trim)
        .filter(|cell| !blank(cell))
}

/// Convert screening-list rows into entity records. Rows with no name, or
/// with neither source field, are dropped.
fn convert_rows(data: &Table) -> Vec<Record> {
    let mut records = Vec::new();
    for row in &data.rows {
        let Some(name) = filled(data, row, "name") else {
            continue;
        };

        let source = filled(data, row, "source");
        let source_url = filled(data, row, "source_list_url");
        let resource = match (source, source_url) {
            (None, None) => continue,
            (Some(source), None) => source.to_string(),
            (None, Some(url)) => url.to_string(),
            (Some(source), Some(url)) => format!("{source} {url}"),
        };

        let names = match filled(data, row, "alt_names") {
            Some(alt) => format!("{name}\n{alt}"),
            None => name.to_string(),
        };

        let mut record = Record::new();
        record.insert("Names".to_string(), json!(names));
        record.insert("Resource".to_string(), json!(resource));
        if let Some(address) = filled(data, row, "addresses") {
            record.insert("Address".to_string(), json!(address));
        }
        records.push(record);
    }
    records
}
