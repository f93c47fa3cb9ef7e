//! OpenAI-compatible summarizer
//!
//! Sends one chat-completions request per call and expects a JSON object
//! `{ "summary": ..., "bullet_points": [...] }` back. Works with any
//! endpoint speaking the OpenAI wire format (OpenAI, xAI, local servers).

use super::prompts::{build_summary_prompt, Persona, SUMMARY_SYSTEM_PROMPT};
use super::utils::{extract_json_object, strip_bullet};
use super::{Summarizer, SummaryOutput};
use crate::error::{ConfigError, SummarizerError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT_SECS: u64 = 90;

/// Connection settings for [`OpenAiSummarizer`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(skip_serializing)]
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Per-call timeout; a timeout counts as a retryable failure
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            temperature: 0.2,
            max_output_tokens: 4_000,
        }
    }

    /// Load from the environment (and a `.env` file when present)
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let api_key = std::env::var("LONGDOC_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .map_err(|_| ConfigError::Missing("LONGDOC_API_KEY or OPENAI_API_KEY".to_string()))?;

        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("LONGDOC_BASE_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(model) = std::env::var("LONGDOC_MODEL") {
            config.model = model;
        }
        if let Ok(raw) = std::env::var("LONGDOC_TIMEOUT_SECS") {
            config.timeout_secs = raw.parse().map_err(|_| ConfigError::Invalid {
                key: "LONGDOC_TIMEOUT_SECS".to_string(),
                value: raw.clone(),
            })?;
        }
        Ok(config)
    }
}

/// [`Summarizer`] backed by an OpenAI-compatible chat-completions API
pub struct OpenAiSummarizer {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiSummarizer {
    pub fn new(config: OpenAiConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs + 5))
            .pool_max_idle_per_host(16)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| ConfigError::Invalid {
                key: "http_client".to_string(),
                value: e.to_string(),
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(
        &self,
        text: &str,
        persona: Persona,
        length_multiplier: f64,
    ) -> Result<SummaryOutput, SummarizerError> {
        let prompt = build_summary_prompt(text, persona, length_multiplier);

        tracing::debug!(
            "[OpenAiSummarizer] Request: {} chars, multiplier {:.3}, persona {}",
            text.chars().count(),
            length_multiplier,
            persona.as_str()
        );

        let request_future = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({
                "model": self.config.model,
                "messages": [
                    {"role": "system", "content": SUMMARY_SYSTEM_PROMPT},
                    {"role": "user", "content": prompt}
                ],
                "max_tokens": self.config.max_output_tokens,
                "temperature": self.config.temperature
            }))
            .send();

        // Wrap in timeout to prevent indefinite hang
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let response = match tokio::time::timeout(timeout, request_future).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => return Err(SummarizerError::Request(e.to_string())),
            Err(_) => return Err(SummarizerError::Timeout(self.config.timeout_secs)),
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("[OpenAiSummarizer] API error ({}): {}", status, body);
            return Err(SummarizerError::Api { status, body });
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct Message {
            content: Option<String>,
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| SummarizerError::InvalidResponse(format!("unreadable body: {}", e)))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| SummarizerError::InvalidResponse("no content".to_string()))?;

        parse_summary_reply(&content)
    }
}

/// Turn model output into a [`SummaryOutput`]
///
/// Prefers the requested JSON object; a reply without one is taken as plain
/// prose, with any bullet-marked lines lifted into `bullet_points`.
pub fn parse_summary_reply(content: &str) -> Result<SummaryOutput, SummarizerError> {
    if content.trim().is_empty() {
        return Err(SummarizerError::InvalidResponse("empty content".to_string()));
    }

    if let Some(json) = extract_json_object(content) {
        if let Ok(parsed) = serde_json::from_str::<SummaryOutput>(json) {
            if !parsed.summary.trim().is_empty() {
                return Ok(SummaryOutput {
                    summary: parsed.summary.trim().to_string(),
                    bullet_points: parsed
                        .bullet_points
                        .iter()
                        .map(|b| strip_bullet(b).to_string())
                        .filter(|b| !b.is_empty())
                        .collect(),
                });
            }
        }
    }

    let mut prose = Vec::new();
    let mut bullet_points = Vec::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("- ") || trimmed.starts_with("* ") || trimmed.starts_with("• ") {
            bullet_points.push(strip_bullet(trimmed).to_string());
        } else if !trimmed.is_empty() {
            prose.push(trimmed);
        }
    }

    let summary = if prose.is_empty() {
        bullet_points.join(" ")
    } else {
        prose.join(" ")
    };

    Ok(SummaryOutput {
        summary,
        bullet_points,
    })
}
