//! OpenAI chat-completions backend (`POST {base_url}/chat/completions`).

use super::error::BackendError;
use super::sse::{self, SseStep};
use super::{accumulate, api_key_from_env, BackendKind, TranslationBackend, TranslationStream};
use crate::core::prompt;
use crate::core::types::{BackendConfig, SourceProgram};
use async_trait::async_trait;
use serde_json::Value;

pub struct OpenAiBackend {
    config: BackendConfig,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiBackend {
    /// The API key is read from `config.api_key_env` when a stream opens.
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
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn build_payload(&self, source: &SourceProgram) -> Value {
        let mut payload = serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": prompt::SYSTEM_INSTRUCTION },
                { "role": "user", "content": prompt::user_prompt(source.as_str()) },
            ],
            "stream": true,
        });
        if let Some(max_tokens) = self.config.max_tokens {
            payload["max_tokens"] = Value::from(max_tokens);
        }
        payload
    }

    /// Classify one chat-completion chunk.
    fn parse_event(_event: &str, data: &str) -> Result<SseStep, BackendError> {
        if data.trim() == "[DONE]" {
            return Ok(SseStep::Done);
        }
        let value: Value =
            serde_json::from_str(data).map_err(|e| BackendError::Serialization(e.to_string()))?;

        if let Some(err) = value.get("error") {
            let message = err
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error");
            return Err(BackendError::Stream(message.to_string()));
        }

        let fragment = value
            .get("choices")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|c| c.get("delta"))
            .and_then(|d| d.get("content"))
            .and_then(|v| v.as_str())
            .unwrap_or("");

        if fragment.is_empty() {
            Ok(SseStep::Skip)
        } else {
            Ok(SseStep::Fragment(fragment.to_string()))
        }
    }
}

#[async_trait]
impl TranslationBackend for OpenAiBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpt
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
            .bearer_auth(api_key)
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

        tracing::debug!(model = %self.config.model, "openai stream opened");
        Ok(accumulate(sse::fragments(response, Self::parse_event)))
    }
}
