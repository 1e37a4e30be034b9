//! Flagger job: resolve entities of concern against scholarly databases.
//!
//! Fetch reads the screening-list CSV and builds a name-plus-aliases list,
//! dropping individuals (only institutions are resolvable). Process fans
//! every name and alias out to the OpenAlex autocomplete endpoint for each
//! entity type, with bounded concurrency and a pause between batches to
//! respect the polite-pool rate limits. Update writes one JSON map per
//! entity type.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use quarry_common::{store, table, JobConfig, Table};
use quarry_engine::{JobHandler, Payload};

/// Entity types queried per name.
const ENTITY_TYPES: [&str; 3] = ["institutions", "funders", "publishers"];
/// Queries in flight at once.
const BATCH_SIZE: usize = 9;
/// Pause between batches.
const BATCH_PAUSE: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// EntitySearch — autocomplete lookups behind a trait for testing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub name: String,
}

#[async_trait]
pub trait EntitySearch: Send + Sync {
    /// Autocomplete matches for a query within one entity type.
    async fn autocomplete(&self, query: &str, entity_type: &str) -> Result<Vec<SearchHit>>;
}

/// OpenAlex autocomplete client. Sends a mailto to join the polite pool.
pub struct OpenAlexSearch {
    client: reqwest::Client,
    mailto: String,
}

impl OpenAlexSearch {
    pub fn new(mailto: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: crate::http::client()?,
            mailto: mailto.into(),
        })
    }
}

#[async_trait]
impl EntitySearch for OpenAlexSearch {
    async fn autocomplete(&self, query: &str, entity_type: &str) -> Result<Vec<SearchHit>> {
        #[derive(Deserialize)]
        struct AutocompleteResponse {
            results: Vec<AutocompleteHit>,
        }
        #[derive(Deserialize)]
        struct AutocompleteHit {
            id: String,
            display_name: String,
        }

        let url = format!("https://api.openalex.org/autocomplete/{entity_type}");
        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("mailto", self.mailto.as_str())])
            .send()
            .await
            .with_context(|| format!("Autocomplete request for '{query}' failed"))?
            .error_for_status()
            .with_context(|| format!("Autocomplete for '{query}' returned an error status"))?;

        let parsed: AutocompleteResponse = response
            .json()
            .await
            .context("Invalid autocomplete response")?;
        Ok(parsed
            .results
            .into_iter()
            .map(|hit| SearchHit {
                id: hit.id,
                name: hit.display_name,
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// One pending autocomplete lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Query {
    entity_id: usize,
    text: String,
    entity_type: &'static str,
}

pub struct FlaggerJob {
    search: Arc<dyn EntitySearch>,
}

impl FlaggerJob {
    pub fn new(search: Arc<dyn EntitySearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl JobHandler for FlaggerJob {
    async fn fetch(&self, config: &JobConfig) -> Result<Payload> {
        let input = config.path("input_csv")?;
        let data = table::read(&input)?;
        let entities = entity_list(&data);
        info!(entities = entities.len(), "Loaded flagger entity list");
        Ok(Payload::Json(Value::Array(entities)))
    }

    async fn process(&self, raw: Payload, _config: &JobConfig) -> Result<Payload> {
        let Payload::Json(Value::Array(entities)) = raw else {
            return Err(anyhow!("flagger expects a JSON array of entities"));
        };

        let queries = build_queries(&entities);
        info!(queries = queries.len(), "Resolving entities against OpenAlex");

        let mut grouped: Map<String, Value> = ENTITY_TYPES
            .iter()
            .map(|t| (t.to_string(), json!({})))
            .collect();

        for batch in queries.chunks(BATCH_SIZE) {
            let lookups = batch.iter().map(|query| {
                let search = self.search.clone();
                async move {
                    let hits = match search.autocomplete(&query.text, query.entity_type).await {
                        Ok(hits) => hits,
                        Err(err) => {
                            // One failed lookup degrades to no matches.
                            warn!(
                                query = query.text.as_str(),
                                entity_type = query.entity_type,
                                error = %err,
                                "Autocomplete lookup failed"
                            );
                            Vec::new()
                        }
                    };
                    (query, hits)
                }
            });

            for (query, hits) in join_all(lookups).await {
                record_hits(&mut grouped, query, &hits);
            }
            tokio::time::sleep(BATCH_PAUSE).await;
        }

        Ok(Payload::Json(Value::Object(grouped)))
    }

    async fn update(&self, processed: Payload, config: &JobConfig) -> Result<()> {
        let Payload::Json(Value::Object(grouped)) = processed else {
            return Err(anyhow!("flagger expects grouped results"));
        };

        for (entity_type, config_key) in [
            ("institutions", "output_institutions"),
            ("funders", "output_funders"),
            ("publishers", "output_publishers"),
        ] {
            let path = config.path(config_key)?;
            let results = grouped.get(entity_type).cloned().unwrap_or_else(|| json!({}));
            store::write_value(&path, &results)?;
            info!(entity_type, path = %path.display(), "Wrote flagger results");
        }
        Ok(())
    }
}

/// Build the `{name, aliases}` list from the screening CSV, skipping rows
/// typed as individuals.
fn entity_list(data: &Table) -> Vec<Value> {
    let mut entities = Vec::new();
    for row in &data.rows {
        if let Some(kind) = data.cell(row, "type") {
            if kind.trim().eq_ignore_ascii_case("individual") {
                continue;
            }
        }
        let Some(name) = data.cell(row, "name").filter(|n| !n.trim().is_empty()) else {
            continue;
        };
        let aliases: Vec<String> = match data.cell(row, "aliases") {
            Some(raw) if !raw.trim().is_empty() => raw
                .split(',')
                .map(str::trim)
                .filter(|alias| !alias.is_empty())
                .map(str::to_string)
                .collect(),
            _ => vec![name.trim().to_string()],
        };
        entities.push(json!({"name": name.trim(), "aliases": aliases}));
    }
    entities
}

/// Fan each entity's name and aliases out across all entity types.
fn build_queries(entities: &[Value]) -> Vec<Query> {
    let mut queries = Vec::new();
    for (entity_id, entity) in entities.iter().enumerate() {
        let name = entity["name"].as_str().unwrap_or_default();
        let mut texts = vec![name.to_string()];
        if let Some(aliases) = entity["aliases"].as_array() {
            texts.extend(
                aliases
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string),
            );
        }
        for text in texts {
            if text.is_empty() {
                continue;
            }
            for entity_type in ENTITY_TYPES {
                queries.push(Query {
                    entity_id,
                    text: text.clone(),
                    entity_type,
                });
            }
        }
    }
    queries
}

/// Merge one lookup's hits into the grouped results: entries accumulate per
/// entity id within each type.
fn record_hits(grouped: &mut Map<String, Value>, query: &Query, hits: &[SearchHit]) {
    let hits_json: Vec<Value> = hits
        .iter()
        .map(|hit| json!({"id": hit.id, "name": hit.name, "type": query.entity_type}))
        .collect();

    let Some(bucket) = grouped
        .get_mut(query.entity_type)
        .and_then(Value::as_object_mut)
    else {
        return;
    };

    let key = query.entity_id.to_string();
    match bucket.get_mut(&key) {
        Some(existing) => {
            if let Some(results) = existing["results"].as_array_mut() {
                results.extend(hits_json);
            }
        }
        None => {
            bucket.insert(
                key,
                json!({
                    "id": query.entity_id,
                    "entity_type": query.entity_type,
                    "results": hits_json,
                }),
            );
        }
    }
}
