//! The job handler contract.

use anyhow::Result;
use async_trait::async_trait;

use quarry_common::{JobConfig, Table};

/// Data flowing between job stages. The engine never interprets the shape,
/// only the item count for progress logging.
#[derive(Debug, Clone)]
pub enum Payload {
    Json(serde_json::Value),
    Table(Table),
}

impl Payload {
    /// Number of items when the payload has a natural length (JSON array or
    /// table rows). `None` degrades stage logging to an `N/A` marker.
    pub fn item_count(&self) -> Option<usize> {
        match self {
            Payload::Json(serde_json::Value::Array(items)) => Some(items.len()),
            Payload::Json(_) => None,
            Payload::Table(table) => Some(table.len()),
        }
    }
}

/// A job's three pluggable stages. Implementations are registered by name in
/// the [`crate::HandlerRegistry`] at startup; the run plan refers to them by
/// that name.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Pull raw data from the upstream source.
    async fn fetch(&self, config: &JobConfig) -> Result<Payload>;

    /// Transform raw data into the records to persist.
    async fn process(&self, raw: Payload, config: &JobConfig) -> Result<Payload>;

    /// Merge processed records into the local store.
    async fn update(&self, processed: Payload, config: &JobConfig) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_array_has_a_count() {
        assert_eq!(Payload::Json(json!([1, 2, 3])).item_count(), Some(3));
    }

    #[test]
    fn non_array_json_has_no_count() {
        assert_eq!(Payload::Json(json!({"a": 1})).item_count(), None);
    }

    #[test]
    fn table_counts_rows() {
        let table = Table {
            headers: vec!["_id".into()],
            rows: vec![vec!["1".into()], vec!["2".into()]],
        };
        assert_eq!(Payload::Table(table).item_count(), Some(2));
    }
}
