//! Chat model access for entity extraction.
//!
//! One narrow trait so jobs can be tested with a canned model. The real
//! implementation speaks the OpenAI chat-completions wire format. The API
//! key stays an env var, never part of a job config.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

/// Attempts per completion before giving up.
const MAX_RETRIES: u32 = 3;
/// Pause between attempts.
const RETRY_SLEEP: Duration = Duration::from_secs(5);

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send one user prompt, return the assistant's text reply.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// OpenAI-compatible client
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiChat {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: crate::http::client()?,
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://api.openai.com/v1".to_string(),
        })
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Self::new(api_key, model)
    }

    /// Point at an OpenAI-compatible endpoint (local models, proxies).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn try_complete(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.1,
        });
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Chat completion request failed")?
            .error_for_status()
            .context("Chat completion returned an error status")?;

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Invalid chat completion response")?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("chat completion response had no choices"))
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, prompt: &str) -> Result<String> {
        if self.api_key.is_empty() {
            bail!("no API key configured for chat model");
        }
        let mut last_err = None;
        for attempt in 1..=MAX_RETRIES {
            match self.try_complete(prompt).await {
                Ok(reply) => return Ok(reply),
                Err(err) => {
                    warn!(attempt, error = %err, "Chat completion failed");
                    last_err = Some(err);
                    if attempt < MAX_RETRIES {
                        tokio::time::sleep(RETRY_SLEEP).await;
                    }
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| anyhow!("chat completion failed"))
            .context(format!("Giving up after {MAX_RETRIES} attempts")))
    }
}
