//! Hosted-model extractor.
//!
//! Sends one OpenAI-compatible Chat Completions request per call and parses
//! the JSON object in the reply. There is no retry loop: a failed call is
//! reported to the caller, who decides whether to re-submit.

use super::prompt::{
    build_full_prompt, build_incremental_prompt, parse_fact_bundle, parse_incremental_update,
    EXTRACTION_SYSTEM_PROMPT,
};
use super::Extractor;
use crate::config::ExtractorConfig;
use crate::memory::{FactBundle, FactSet, IncrementalUpdate};
use crate::{EchoNoteError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_ERROR_DETAIL_CHARS: usize = 500;

// ─── Chat Completions API types ─────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

// ─── Extractor ──────────────────────────────────────────────────────

/// Extractor backed by a hosted chat-completions model
pub struct LlmExtractor {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    max_tokens: u32,
    temperature: f32,
}

impl LlmExtractor {
    /// Create an extractor from config, reading the API key from the environment
    pub fn new(config: &ExtractorConfig) -> Result<Self> {
        let api_key = config.api_key()?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &ExtractorConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("echonote/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EchoNoteError::Config(format!("failed to build HTTP client: {e}")))?;

        info!(
            "LLM extractor: model={}, base_url={}",
            config.model, config.base_url
        );

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Send a single chat completion and return the assistant text.
    async fn complete(&self, user_prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!("Calling extraction model with prompt length: {}", user_prompt.len());

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: EXTRACTION_SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: false,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(Self::map_reqwest_error)?;

        let response = Self::check_response_status(response).await?;

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            EchoNoteError::ExtractionFailed(format!("malformed completion body: {e}"))
        })?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        debug!("Extraction model response: {}", content);
        Ok(content)
    }

    async fn check_response_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let detail = extract_error_detail(&body);
        let detail = truncate_error_detail(&detail, MAX_ERROR_DETAIL_CHARS);
        if !detail.is_empty() {
            return Err(EchoNoteError::ExtractionFailed(format!(
                "API error {status}: {detail}"
            )));
        }
        Err(EchoNoteError::ExtractionFailed(format!("API error {status}")))
    }

    fn map_reqwest_error(e: reqwest::Error) -> EchoNoteError {
        if e.is_timeout() {
            EchoNoteError::ExtractionFailed(format!("timeout: {e}"))
        } else if e.is_connect() {
            EchoNoteError::ExtractionFailed(format!("network: {e}"))
        } else {
            EchoNoteError::ExtractionFailed(e.to_string())
        }
    }
}

#[async_trait]
impl Extractor for LlmExtractor {
    async fn extract(&self, transcript: &str) -> Result<FactBundle> {
        let content = self.complete(&build_full_prompt(transcript)).await?;
        parse_fact_bundle(&content)
    }

    async fn extract_incremental(
        &self,
        delta: &str,
        existing: &FactSet,
    ) -> Result<IncrementalUpdate> {
        let prompt = build_incremental_prompt(delta, existing)?;
        let content = self.complete(&prompt).await?;
        parse_incremental_update(&content)
    }
}

/// Pull a human-readable message out of an error body
fn extract_error_detail(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(msg) = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return msg.to_string();
        }
        if let Some(msg) = value.get("message").and_then(|m| m.as_str()) {
            return msg.to_string();
        }
    }

    trimmed.to_string()
}

fn truncate_error_detail(detail: &str, max_chars: usize) -> String {
    if detail.chars().count() <= max_chars {
        return detail.to_string();
    }

    let mut truncated = detail.chars().take(max_chars).collect::<String>();
    truncated.push_str("... [truncated]");
    truncated
}
