//! JSON record stores with key-based incremental merge.
//!
//! A store is a flat JSON array of objects, rewritten in full on every
//! update. Loading is deliberately permissive: a missing or corrupt file
//! yields an empty store plus an explicit [`StoreRecovery`] reason, so the
//! empty-on-corruption policy is an auditable decision at the call site
//! rather than a silent catch-all.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value};

/// One store entry: a JSON object keyed by a domain-specific field.
pub type Record = Map<String, Value>;

/// Why a load produced an empty store instead of reading one from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreRecovery {
    /// No file at the path yet (first run).
    Missing,
    /// The file exists but does not parse as a JSON array of objects.
    /// Its contents are abandoned on the next write.
    Corrupt(String),
}

/// Result of loading a store: the records plus an optional recovery reason.
#[derive(Debug)]
pub struct LoadedStore {
    pub records: Vec<Record>,
    pub recovery: Option<StoreRecovery>,
}

impl LoadedStore {
    fn empty(recovery: StoreRecovery) -> Self {
        Self {
            records: Vec::new(),
            recovery: Some(recovery),
        }
    }
}

/// Load a JSON record store. Never fails: absent or unparseable state is
/// returned as an empty store with the reason attached.
pub fn load(path: &Path) -> LoadedStore {
    if !path.exists() {
        return LoadedStore::empty(StoreRecovery::Missing);
    }
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => return LoadedStore::empty(StoreRecovery::Corrupt(err.to_string())),
    };
    let value: Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(err) => return LoadedStore::empty(StoreRecovery::Corrupt(err.to_string())),
    };
    let Value::Array(items) = value else {
        return LoadedStore::empty(StoreRecovery::Corrupt("not a JSON array".to_string()));
    };
    let records = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(obj) => Some(obj),
            _ => None,
        })
        .collect();
    LoadedStore {
        records,
        recovery: None,
    }
}

/// Write the full store back to disk as pretty-printed UTF-8 JSON,
/// creating parent directories as needed.
pub fn write(path: &Path, records: &[Record]) -> Result<()> {
    write_value(path, &Value::Array(records.iter().cloned().map(Value::Object).collect()))
}

/// Write any JSON value as a pretty-printed file (derived artifacts that
/// are maps rather than record arrays).
pub fn write_value(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let body = serde_json::to_string_pretty(value).context("Failed to serialize store")?;
    fs::write(path, body).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Return the candidates whose `key` value is not already present among the
/// existing records, preserving candidate order. Candidates without the key
/// are skipped. Existing records are never touched.
///
/// Repeated merges of the same candidate set are idempotent: once merged,
/// a second pass yields nothing.
pub fn merge_new(key: &str, existing: &[Record], candidates: &[Record]) -> Vec<Record> {
    let seen: HashSet<String> = existing
        .iter()
        .filter_map(|record| record.get(key).map(key_repr))
        .collect();
    candidates
        .iter()
        .filter(|candidate| match candidate.get(key) {
            Some(value) => !seen.contains(&key_repr(value)),
            None => false,
        })
        .cloned()
        .collect()
}

/// Canonical comparison form for a key value. Strings compare by content;
/// anything else (numeric ids) by its JSON rendering.
fn key_repr(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    #[test]
    fn merge_adds_only_unseen_keys() {
        let existing = vec![record(&[("Names", "Foo")])];
        let candidates = vec![record(&[("Names", "Foo")]), record(&[("Names", "Bar")])];

        let new = merge_new("Names", &existing, &candidates);
        assert_eq!(new.len(), 1);
        assert_eq!(new[0].get("Names").unwrap(), "Bar");

        let mut merged = existing;
        merged.extend(new);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merge_is_idempotent() {
        let candidates = vec![record(&[("link", "a")]), record(&[("link", "b")])];

        let first = merge_new("link", &[], &candidates);
        assert_eq!(first.len(), 2);

        let second = merge_new("link", &first, &candidates);
        assert!(second.is_empty());
    }

    #[test]
    fn merge_preserves_candidate_order() {
        let candidates = vec![
            record(&[("_id", "3")]),
            record(&[("_id", "1")]),
            record(&[("_id", "2")]),
        ];
        let new = merge_new("_id", &[], &candidates);
        let ids: Vec<&str> = new.iter().map(|r| r["_id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
    }

    #[test]
    fn merge_skips_candidates_without_key() {
        let candidates = vec![record(&[("other", "x")]), record(&[("link", "a")])];
        let new = merge_new("link", &[], &candidates);
        assert_eq!(new.len(), 1);
    }

    #[test]
    fn numeric_keys_compare_by_value() {
        let existing = vec![[("_id".to_string(), json!(7))].into_iter().collect()];
        let candidates = vec![
            [("_id".to_string(), json!(7))].into_iter().collect(),
            [("_id".to_string(), json!(8))].into_iter().collect(),
        ];
        let new = merge_new("_id", &existing, &candidates);
        assert_eq!(new.len(), 1);
        assert_eq!(new[0]["_id"], json!(8));
    }

    #[test]
    fn missing_file_loads_as_empty_with_reason() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load(&dir.path().join("absent.json"));
        assert!(loaded.records.is_empty());
        assert_eq!(loaded.recovery, Some(StoreRecovery::Missing));
    }

    #[test]
    fn corrupt_file_loads_as_empty_with_reason() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, b"{not json").unwrap();

        let loaded = load(&path);
        assert!(loaded.records.is_empty());
        assert!(matches!(loaded.recovery, Some(StoreRecovery::Corrupt(_))));
    }

    #[test]
    fn write_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/store.json");
        let records = vec![record(&[("permalink", "/uni/1"), ("title", "Example")])];

        write(&path, &records).unwrap();
        let loaded = load(&path);
        assert!(loaded.recovery.is_none());
        assert_eq!(loaded.records, records);
    }
}
