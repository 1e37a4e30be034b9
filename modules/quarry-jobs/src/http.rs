//! Retrying HTTP fetch helpers shared by the scraping jobs.
//!
//! Transient upstream failures get a fixed number of attempts with a fixed
//! sleep between them. Exhausting the retries raises; the job runner catches
//! it at the job boundary.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;

/// Attempts per request before giving up.
const MAX_ATTEMPTS: u32 = 3;
/// Pause between attempts.
const RETRY_SLEEP: Duration = Duration::from_secs(5);
/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the shared client used by all fetchers.
pub fn client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

/// GET a URL and parse the response body as JSON.
pub async fn get_json(client: &reqwest::Client, url: &str) -> Result<serde_json::Value> {
    let body = get_text(client, url).await?;
    serde_json::from_str(&body).with_context(|| format!("Invalid JSON from {url}"))
}

/// GET a URL and return the response body as text. Retries transient
/// failures (connect errors, non-2xx statuses) with a fixed sleep.
pub async fn get_text(client: &reqwest::Client, url: &str) -> Result<String> {
    let mut last_err = None;
    for attempt in 1..=MAX_ATTEMPTS {
        match try_get(client, url).await {
            Ok(body) => return Ok(body),
            Err(err) => {
                warn!(url, attempt, error = %err, "Fetch attempt failed");
                last_err = Some(err);
                if attempt < MAX_ATTEMPTS {
                    tokio::time::sleep(RETRY_SLEEP).await;
                }
            }
        }
    }
    Err(last_err
        .unwrap_or_else(|| anyhow::anyhow!("fetch failed"))
        .context(format!("Giving up on {url} after {MAX_ATTEMPTS} attempts")))
}

async fn try_get(client: &reqwest::Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .header("Accept", "application/json")
        .send()
        .await
        .with_context(|| format!("Request to {url} failed"))?;
    let response = response
        .error_for_status()
        .with_context(|| format!("Request to {url} returned an error status"))?;
    response
        .text()
        .await
        .with_context(|| format!("Failed to read response body from {url}"))
}
