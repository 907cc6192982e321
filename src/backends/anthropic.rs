//! Anthropic messages backend (`POST {base_url}/v1/messages`).

use super::error::BackendError;
use super::sse::{self, SseStep};
use super::{accumulate, api_key_from_env, BackendKind, TranslationBackend, TranslationStream};
use crate::core::prompt;
use crate::core::types::{BackendConfig, SourceProgram};
use async_trait::async_trait;
use serde_json::Value;

const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 2000;

pub struct AnthropicBackend {
    config: BackendConfig,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl AnthropicBackend {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            api_key: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_api_key(config: BackendConfig, api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::new(config)
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    fn build_payload(&self, source: &SourceProgram) -> Value {
        serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "system": prompt::SYSTEM_INSTRUCTION,
            "messages": [
                { "role": "user", "content": prompt::user_prompt(source.as_str()) },
            ],
            "stream": true,
        })
    }

    /// Classify one messages-API event by its data `type`.
    fn parse_event(_event: &str, data: &str) -> Result<SseStep, BackendError> {
        let value: Value =
            serde_json::from_str(data).map_err(|e| BackendError::Serialization(e.to_string()))?;

        match value.get("type").and_then(|t| t.as_str()).unwrap_or("") {
            "content_block_delta" => {
                let text = value
                    .get("delta")
                    .filter(|d| d.get("type").and_then(|t| t.as_str()) == Some("text_delta"))
                    .and_then(|d| d.get("text"))
                    .and_then(|t| t.as_str())
                    .unwrap_or("");
                if text.is_empty() {
                    Ok(SseStep::Skip)
                } else {
                    Ok(SseStep::Fragment(text.to_string()))
                }
            }
            "message_stop" => Ok(SseStep::Done),
            "error" => {
                let err = value.get("error");
                let kind = err
                    .and_then(|e| e.get("type"))
                    .and_then(|t| t.as_str())
                    .unwrap_or("error");
                let message = err
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown error");
                Err(BackendError::Stream(format!("{}: {}", kind, message)))
            }
            _ => Ok(SseStep::Skip),
        }
    }
}

#[async_trait]
impl TranslationBackend for AnthropicBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Claude
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn stream_translate(
        &self,
        source: &SourceProgram,
    ) -> Result<TranslationStream, BackendError> {
        let api_key = match &self.api_key {
            Some(key) => key.clone(),
            None => api_key_from_env(&self.config.api_key_env)?,
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.build_payload(source))
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .map_err(|e| BackendError::Network(e.to_string()))?;
            return Err(BackendError::from_status(status.as_u16(), &text));
        }

        tracing::debug!(model = %self.config.model, "anthropic stream opened");
        Ok(accumulate(sse::fragments(response, Self::parse_event)))
    }
}
