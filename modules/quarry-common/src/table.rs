//! CSV table stores with key-column incremental merge.
//!
//! Mirrors the JSON store semantics for tabular sources: full-file rewrite,
//! permissive load with an explicit recovery reason, and an order-preserving
//! diff of candidate rows against existing rows by a key column.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::store::StoreRecovery;

/// An in-memory CSV table: one header row plus data rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Index of a named column, if present.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell value for a named column in one row.
    pub fn cell<'a>(&self, row: &'a [String], column: &str) -> Option<&'a str> {
        self.column(column)
            .and_then(|idx| row.get(idx))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Result of loading a table store.
#[derive(Debug)]
pub struct LoadedTable {
    pub table: Table,
    pub recovery: Option<StoreRecovery>,
}

impl LoadedTable {
    fn empty(recovery: StoreRecovery) -> Self {
        Self {
            table: Table::default(),
            recovery: Some(recovery),
        }
    }
}

/// Parse CSV text (header row required) into a [`Table`].
pub fn parse(data: &str) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(data.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV header row")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.context("Failed to parse CSV row")?;
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        // Flexible rows are padded/truncated to the header width.
        row.resize(headers.len(), String::new());
        rows.push(row);
    }
    Ok(Table { headers, rows })
}

/// Load a table store. Absent or unparseable state is returned as an empty
/// table with the reason attached, same policy as the JSON store.
pub fn load(path: &Path) -> LoadedTable {
    if !path.exists() {
        return LoadedTable::empty(StoreRecovery::Missing);
    }
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => return LoadedTable::empty(StoreRecovery::Corrupt(err.to_string())),
    };
    match parse(&raw) {
        Ok(table) => LoadedTable {
            table,
            recovery: None,
        },
        Err(err) => LoadedTable::empty(StoreRecovery::Corrupt(format!("{err:#}"))),
    }
}

/// Strict load for tables produced by an upstream job: a missing or broken
/// file is an error for the caller to surface, not state to heal.
pub fn read(path: &Path) -> Result<Table> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read CSV file {}", path.display()))?;
    parse(&raw).with_context(|| format!("Failed to parse CSV file {}", path.display()))
}

/// Write the full table back to disk, creating parent directories as needed.
pub fn write(path: &Path, table: &Table) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to open {} for writing", path.display()))?;
    writer
        .write_record(&table.headers)
        .context("Failed to write CSV header")?;
    for row in &table.rows {
        writer.write_record(row).context("Failed to write CSV row")?;
    }
    writer.flush().context("Failed to flush CSV writer")?;
    Ok(())
}

/// Candidate rows whose key-column value is absent from the existing table,
/// in candidate order. An existing table without the key column contributes
/// no keys (everything is new); candidates must carry the column.
pub fn new_rows(key_column: &str, existing: &Table, candidates: &Table) -> Result<Table> {
    let Some(candidate_idx) = candidates.column(key_column) else {
        bail!("fetched CSV has no '{key_column}' column");
    };

    let seen: HashSet<&str> = match existing.column(key_column) {
        Some(idx) => existing
            .rows
            .iter()
            .filter_map(|row| row.get(idx))
            .map(String::as_str)
            .collect(),
        None => HashSet::new(),
    };

    let rows = candidates
        .rows
        .iter()
        .filter(|row| {
            row.get(candidate_idx)
                .map(|key| !seen.contains(key.as_str()))
                .unwrap_or(false)
        })
        .cloned()
        .collect();

    Ok(Table {
        headers: candidates.headers.clone(),
        rows,
    })
}

/// Append new rows to an existing table, remapping columns by name when the
/// header orders differ. An empty existing table adopts the new headers.
pub fn append(existing: &Table, new: &Table) -> Table {
    if existing.headers.is_empty() {
        return new.clone();
    }
    let mut merged = existing.clone();
    if existing.headers == new.headers {
        merged.rows.extend(new.rows.iter().cloned());
        return merged;
    }
    for row in &new.rows {
        let remapped = existing
            .headers
            .iter()
            .map(|header| {
                new.column(header)
                    .and_then(|idx| row.get(idx))
                    .cloned()
                    .unwrap_or_default()
            })
            .collect();
        merged.rows.push(remapped);
    }
    merged
}
