// src/core/llm_client.rs
//! Generation capability used by the translator, insights, suggestions and
//! analyzers, with an OpenAI-compatible HTTP implementation.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, trace};

use crate::config::LlmSettings;
use crate::types::response::{
    ApiErrorEnvelope, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ResponseFormat,
};

const CHAT_COMPLETIONS_ENDPOINT: &str = "/chat/completions";

const JSON_ONLY_INSTRUCTION: &str = "You are a helpful assistant that responds ONLY with valid JSON. \
Never include explanations, markdown formatting, or any text outside the JSON object.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Transport(String),

    #[error("generation service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("generation service quota exceeded")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("generation response was not valid: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Short tag naming what the request is for, used in logs.
    pub purpose: &'static str,
    pub prompt: String,
    /// Human-readable description of the JSON shape the response must match.
    pub schema: String,
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(purpose: &'static str, prompt: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            purpose,
            prompt: prompt.into(),
            schema: schema.into(),
            temperature: 0.3,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
pub trait GenerationCapability: Send + Sync {
    /// Produce a JSON value that should match `request.schema`.
    async fn generate_json(&self, request: &GenerationRequest) -> Result<Value, GenerationError>;
}

/// Typed wrapper over [`GenerationCapability::generate_json`].
pub async fn generate_structured<T: DeserializeOwned>(
    generator: &dyn GenerationCapability,
    request: &GenerationRequest,
) -> Result<T, GenerationError> {
    let value = generator.generate_json(request).await?;
    serde_json::from_value(value).map_err(|e| GenerationError::Malformed(e.to_string()))
}

pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl LlmClient {
    pub fn new(settings: &LlmSettings) -> anyhow::Result<Self> {
        use anyhow::Context;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
        })
    }

    async fn send_completion(
        &self,
        purpose: &str,
        messages: Vec<ChatMessage>,
        temperature: f32,
    ) -> Result<String, GenerationError> {
        let url = format!("{}{}", self.base_url, CHAT_COMPLETIONS_ENDPOINT);
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature,
            response_format: Some(ResponseFormat::json_object()),
        };

        info!("Calling generation service for {}: {}", purpose, url);

        let mut builder = self.client.post(&url).json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        trace!("Generation service status: {}", status);

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok());
            error!(
                "Generation service quota exceeded for {} (retry after: {:?})",
                purpose, retry_after_secs
            );
            return Err(GenerationError::RateLimited { retry_after_secs });
        }

        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or(body);
            error!("Generation service error {}: {}", status, message);
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let completion: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| GenerationError::Malformed(format!("unexpected response body: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::Malformed("no choices in response".to_string()))
    }
}

#[async_trait]
impl GenerationCapability for LlmClient {
    async fn generate_json(&self, request: &GenerationRequest) -> Result<Value, GenerationError> {
        let messages = vec![
            ChatMessage::system(format!(
                "{}\n\nYou must respond with valid JSON matching this schema:\n{}",
                JSON_ONLY_INSTRUCTION, request.schema
            )),
            ChatMessage::user(request.prompt.clone()),
        ];

        let text = self
            .send_completion(request.purpose, messages, request.temperature)
            .await?;

        let json_text = extract_json(&text).ok_or_else(|| {
            GenerationError::Malformed(format!(
                "no JSON object in response: {}",
                text.chars().take(200).collect::<String>()
            ))
        })?;

        serde_json::from_str(json_text).map_err(|e| GenerationError::Malformed(e.to_string()))
    }
}

/// Pull the JSON payload out of a model response that may wrap it in a
/// markdown fence or surround it with prose.
pub fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        if let Some(end) = body.find("```") {
            let inner = body[..end].trim();
            if !inner.is_empty() {
                return Some(inner);
            }
        }
    }

    let open = trimmed.find(|c| c == '{' || c == '[')?;
    let close_char = if trimmed[open..].starts_with('{') { '}' } else { ']' };
    let close = trimmed.rfind(close_char)?;
    (close > open).then(|| &trimmed[open..=close])
}
