//! Government press-release job.
//!
//! Fetch pages the press-release JSON API newest-first and stops at the
//! first article older than the configured start date. Articles must match
//! at least one country keyword and one academic keyword. Process asks the
//! chat model for the responsible institutions and persons per article.
//! Update merges into the JSON store keyed by `link`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde_json::{json, Value};
use tracing::{info, warn};

use quarry_common::{store, JobConfig, StoreRecovery};
use quarry_engine::{JobHandler, Payload};

use crate::ai::ChatModel;
use crate::http;

const DEFAULT_API_URL: &str =
    "https://www.justice.gov/api/v1/press_releases.json?sort=created&direction=DESC&pagesize=50";
/// Pause between page fetches (2 requests per second).
const PAGE_PAUSE: Duration = Duration::from_millis(500);

pub struct PressReleasesJob {
    chat: Arc<dyn ChatModel>,
}

impl PressReleasesJob {
    pub fn new(chat: Arc<dyn ChatModel>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl JobHandler for PressReleasesJob {
    async fn fetch(&self, config: &JobConfig) -> Result<Payload> {
        let start_date = NaiveDate::parse_from_str(config.str("start_date")?, "%Y-%m-%d")
            .context("start_date must be YYYY-MM-DD")?;
        let countries = config.str_list("country_keywords")?;
        let academics = config.str_list("academic_keywords")?;
        let api_url = config.opt_str("api_url").unwrap_or(DEFAULT_API_URL);

        let client = http::client()?;
        let mut articles = Vec::new();

        let first = http::get_json(&client, &page_url(api_url, 0)).await?;
        let total_pages = total_pages(&first);
        let mut reached_start_date = collect_page(
            &first,
            start_date,
            &countries,
            &academics,
            &mut articles,
        );

        for page in 1..total_pages {
            if reached_start_date {
                break;
            }
            tokio::time::sleep(PAGE_PAUSE).await;
            let data = match http::get_json(&client, &page_url(api_url, page)).await {
                Ok(data) => data,
                Err(err) => {
                    // Keep what we have; a partial fetch still advances the store.
                    warn!(page, error = %err, "Stopping pagination early");
                    break;
                }
            };
            reached_start_date =
                collect_page(&data, start_date, &countries, &academics, &mut articles);
        }

        info!(
            articles = articles.len(),
            start_date = %start_date,
            "Press-release fetch complete"
        );
        Ok(Payload::Json(Value::Array(articles)))
    }

    async fn process(&self, raw: Payload, _config: &JobConfig) -> Result<Payload> {
        let Payload::Json(Value::Array(mut articles)) = raw else {
            return Err(anyhow!("press_releases expects a JSON array of articles"));
        };

        let total = articles.len();
        for (i, article) in articles.iter_mut().enumerate() {
            info!(article = i + 1, total, "Extracting entities");
            let text = article
                .get("article_text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let entities = extract_entities(self.chat.as_ref(), &text).await?;
            if let Some(obj) = article.as_object_mut() {
                obj.insert("entities".to_string(), json!(entities));
            }
        }
        Ok(Payload::Json(Value::Array(articles)))
    }

    async fn update(&self, processed: Payload, config: &JobConfig) -> Result<()> {
        let Payload::Json(Value::Array(articles)) = processed else {
            return Err(anyhow!("press_releases expects a JSON array of articles"));
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

        let candidates: Vec<_> = articles
            .into_iter()
            .filter_map(|article| match article {
                Value::Object(obj) => Some(obj),
                _ => None,
            })
            .collect();
        let new_entries = store::merge_new("link", &loaded.records, &candidates);

        let mut merged = loaded.records;
        let added = new_entries.len();
        merged.extend(new_entries);
        store::write(&output_file, &merged)?;

        info!(
            added,
            total = merged.len(),
            path = %output_file.display(),
            "Press-release store updated"
        );
        Ok(())
    }
}

fn page_url(api_url: &str, page: u64) -> String {
    format!("{api_url}&page={page}")
}

/// Total page count from the API's resultset metadata.
fn total_pages(data: &Value) -> u64 {
    let resultset = &data["metadata"]["resultset"];
    let count = int_field(resultset, "count").unwrap_or(0);
    let pagesize = int_field(resultset, "pagesize").unwrap_or(50).max(1);
    count.div_ceil(pagesize)
}

/// The API serves numbers both as integers and as quoted strings.
fn int_field(value: &Value, key: &str) -> Option<u64> {
    match &value[key] {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Scan one page of results into `articles`. Returns true once an article
/// older than `start_date` is seen, which ends pagination: results arrive
/// newest-first, so everything after it is older still.
fn collect_page(
    data: &Value,
    start_date: NaiveDate,
    countries: &[String],
    academics: &[String],
    articles: &mut Vec<Value>,
) -> bool {
    let results = match data["results"].as_array() {
        Some(results) => results,
        None => return false,
    };

    for entry in results {
        let Some(ts) = int_field(entry, "date") else {
            warn!("Entry has no usable date; skipping");
            continue;
        };
        let Some(published) = DateTime::from_timestamp(ts as i64, 0) else {
            warn!(ts, "Entry date out of range; skipping");
            continue;
        };
        if published.date_naive() < start_date {
            info!("Reached an article older than the start date; stopping pagination");
            return true;
        }

        let body = entry["body"].as_str().unwrap_or_default();
        if !matches_any(body, countries) || !matches_any(body, academics) {
            continue;
        }

        articles.push(json!({
            "title": entry["title"].as_str().unwrap_or_default(),
            "link": entry["url"].as_str().unwrap_or_default(),
            "pubDate": published.format("%Y-%m-%d %H:%M:%S").to_string(),
            "article_text": body,
        }));
    }
    false
}

/// Case-insensitive substring match against any keyword.
fn matches_any(text: &str, keywords: &[String]) -> bool {
    let lower = text.to_lowercase();
    keywords
        .iter()
        .any(|keyword| lower.contains(&keyword.to_lowercase()))
}

/// Ask the model for responsible institutions and persons; combine both
/// newline-separated lists.
async fn extract_entities(chat: &dyn ChatModel, content: &str) -> Result<Vec<String>> {
    let institutions_prompt = format!(
        "In the following article, list all NON-US INSTITUTIONS responsible for the crime. \
         Do NOT list names of countries or cities, and do NOT use abbreviations. If there is \
         no crime, list nothing. Return the names as a newline-separated list with no other \
         text and no special characters like '`'. Article: {content}"
    );
    let persons_prompt = format!(
        "In the following article, list the NAMES of the individual person or persons \
         RESPONSIBLE for the crime - the ones at fault, not investigators or victims. If \
         there is no crime, list nothing. Return the names as a newline-separated list with \
         no other text and no special characters like '`'. Article: {content}"
    );

    let institutions = chat.complete(&institutions_prompt).await?;
    let persons = chat.complete(&persons_prompt).await?;

    Ok(institutions
        .lines()
        .chain(persons.lines())
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedChat;

    #[async_trait]
    impl ChatModel for CannedChat {
        async fn complete(&self, prompt: &str) -> Result<String> {
            if prompt.contains("INSTITUTIONS") {
                Ok("Example University\n\nExample Institute\n".to_string())
            } else {
                Ok("Jane Doe".to_string())
            }
        }
    }

    fn entry(ts: i64, body: &str) -> Value {
        json!({
            "date": ts,
            "title": "Title",
            "url": format!("https://example.gov/pr/{ts}"),
            "body": body,
        })
    }

    const RECENT: i64 = 1_750_000_000; // 2025-06-15
    const ANCIENT: i64 = 1_000_000_000; // 2001-09-09

    #[test]
    fn keyword_match_is_case_insensitive() {
        let keywords = vec!["China".to_string()];
        assert!(matches_any("ties to CHINA were found", &keywords));
        assert!(!matches_any("no match here", &keywords));
    }

    #[test]
    fn collect_page_filters_on_both_keyword_lists() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let countries = vec!["china".to_string()];
        let academics = vec!["university".to_string()];
        let data = json!({"results": [
            entry(RECENT, "a china university case"),
            entry(RECENT + 1, "china but nothing else"),
            entry(RECENT + 2, "a university but no country"),
        ]});

        let mut articles = Vec::new();
        let stopped = collect_page(&data, start, &countries, &academics, &mut articles);
        assert!(!stopped);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0]["article_text"], "a china university case");
    }

    #[test]
    fn collect_page_stops_at_articles_older_than_start_date() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let keywords = vec!["china".to_string()];
        let data = json!({"results": [
            entry(RECENT, "china university"),
            entry(ANCIENT, "china university"),
            entry(RECENT, "china university"),
        ]});

        let mut articles = Vec::new();
        let stopped = collect_page(&data, start, &keywords, &keywords, &mut articles);
        assert!(stopped);
        // The article after the cutoff is never examined.
        assert_eq!(articles.len(), 1);
    }

    #[test]
    fn total_pages_handles_string_counts() {
        let data = json!({"metadata": {"resultset": {"count": "120", "pagesize": 50}}});
        assert_eq!(total_pages(&data), 3);
    }

    #[tokio::test]
    async fn process_attaches_combined_entity_list() {
        let job = PressReleasesJob::new(Arc::new(CannedChat));
        let raw = Payload::Json(json!([
            {"title": "t", "link": "l", "article_text": "text"}
        ]));

        let processed = job.process(raw, &JobConfig::default()).await.unwrap();
        let Payload::Json(Value::Array(articles)) = processed else {
            panic!("expected array payload");
        };
        assert_eq!(
            articles[0]["entities"],
            json!(["Example University", "Example Institute", "Jane Doe"])
        );
    }

    #[tokio::test]
    async fn update_merges_by_link_idempotently() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("articles.json");
        let config = JobConfig::from_values(
            [(
                "output_file".to_string(),
                json!(output.to_str().unwrap()),
            )]
            .into_iter()
            .collect(),
        );
        let job = PressReleasesJob::new(Arc::new(CannedChat));
        let payload = || {
            Payload::Json(json!([
                {"link": "a", "title": "one"},
                {"link": "b", "title": "two"},
            ]))
        };

        job.update(payload(), &config).await.unwrap();
        job.update(payload(), &config).await.unwrap();

        let loaded = store::load(&output);
        assert_eq!(loaded.records.len(), 2);
    }
}
