//! Generation provider implementations.
//!
//! Two HTTP backends behind the core [`CompletionProvider`] trait:
//! OpenAI chat completions and Anthropic messages. One request per
//! call, no internal retries — provider failures surface as typed
//! [`GenerationError`] values and the CLI decides how to report them.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use planquery_core::error::GenerationError;
use planquery_core::generate::CompletionProvider;

use crate::config::GenerationConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Create the configured [`CompletionProvider`], or `None` when
/// generation is disabled.
pub fn create_generator(config: &GenerationConfig) -> Result<Option<Box<dyn CompletionProvider>>> {
    match config.provider.as_str() {
        "disabled" => Ok(None),
        "openai" => Ok(Some(Box::new(OpenAiGenerator::new(config)?))),
        "anthropic" => Ok(Some(Box::new(AnthropicGenerator::new(config)?))),
        other => bail!("Unknown generation provider: {}", other),
    }
}

fn map_send_error(e: reqwest::Error, timeout_secs: u64) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout(timeout_secs)
    } else {
        GenerationError::Provider(e.to_string())
    }
}

async fn map_status_error(
    response: reqwest::Response,
    provider: &str,
) -> Result<reqwest::Response, GenerationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status.as_u16() {
        401 | 403 => Err(GenerationError::Auth(format!(
            "{} rejected credentials: {}",
            provider, body
        ))),
        429 => Err(GenerationError::RateLimited),
        _ => Err(GenerationError::Provider(format!(
            "{} API error {}: {}",
            provider, status, body
        ))),
    }
}

// ============ OpenAI ============

/// Completion provider using the OpenAI chat completions API.
///
/// Requires the `OPENAI_API_KEY` environment variable to be set.
pub struct OpenAiGenerator {
    model: String,
    max_tokens: u32,
    temperature: f64,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for OpenAI provider"))?;

        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
            client,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiGenerator {
    async fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| GenerationError::Auth("OPENAI_API_KEY not set".to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.timeout_secs))?;

        let response = map_status_error(response, "OpenAI").await?;
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|t| t.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                GenerationError::MalformedResponse(
                    "missing choices[0].message.content".to_string(),
                )
            })
    }
}

// ============ Anthropic ============

/// Completion provider using the Anthropic messages API.
///
/// Requires the `ANTHROPIC_API_KEY` environment variable to be set.
pub struct AnthropicGenerator {
    model: String,
    max_tokens: u32,
    temperature: f64,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl AnthropicGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for Anthropic provider"))?;

        if std::env::var("ANTHROPIC_API_KEY").is_err() {
            bail!("ANTHROPIC_API_KEY environment variable not set");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
            client,
        })
    }
}

#[async_trait]
impl CompletionProvider for AnthropicGenerator {
    async fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| GenerationError::Auth("ANTHROPIC_API_KEY not set".to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "system": system,
            "messages": [
                {"role": "user", "content": user},
            ],
        });

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.timeout_secs))?;

        let response = map_status_error(response, "Anthropic").await?;
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        json.get("content")
            .and_then(|c| c.get(0))
            .and_then(|b| b.get("text"))
            .and_then(|t| t.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                GenerationError::MalformedResponse("missing content[0].text".to_string())
            })
    }
}
