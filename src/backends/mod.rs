//! TC-020: Translation backends — streaming model providers.
//!
//! Each variant turns a [`SourceProgram`] into a single-pass stream of
//! cumulative [`PartialTranslation`]s. Providers only produce text
//! fragments; [`accumulate`] turns fragments into snapshots so every
//! variant has the same cumulative semantics.

pub mod anthropic;
pub mod error;
pub mod openai;
pub mod sse;

use crate::core::error::PipelineError;
use crate::core::types::{BackendsConfig, PartialTranslation, SourceProgram};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use anthropic::AnthropicBackend;
pub use error::BackendError;
pub use openai::OpenAiBackend;

/// Raw generated text, one item per provider increment.
pub type FragmentStream = BoxStream<'static, Result<String, BackendError>>;

/// Cumulative translation snapshots.
pub type TranslationStream = BoxStream<'static, Result<PartialTranslation, BackendError>>;

/// Known backend variants. Parsed once from a user-facing selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Gpt,
    Claude,
}

impl BackendKind {
    pub const ALL: [BackendKind; 2] = [BackendKind::Gpt, BackendKind::Claude];

    /// Selector label shown to users.
    pub fn label(&self) -> &'static str {
        match self {
            BackendKind::Gpt => "GPT",
            BackendKind::Claude => "Claude",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for BackendKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpt" | "openai" => Ok(BackendKind::Gpt),
            "claude" | "anthropic" => Ok(BackendKind::Claude),
            _ => Err(PipelineError::InvalidSelection(s.to_string())),
        }
    }
}

#[async_trait]
pub trait TranslationBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn model(&self) -> &str;

    /// Open the upstream stream. Failing to establish the call is an `Err`
    /// here; failures after that arrive as an `Err` item in the stream.
    async fn stream_translate(
        &self,
        source: &SourceProgram,
    ) -> Result<TranslationStream, BackendError>;
}

/// Build one backend per variant from config.
pub fn build_backends(config: &BackendsConfig) -> Vec<Arc<dyn TranslationBackend>> {
    vec![
        Arc::new(OpenAiBackend::new(config.gpt.clone())),
        Arc::new(AnthropicBackend::new(config.claude.clone())),
    ]
}

/// Read an API key from the environment.
pub fn api_key_from_env(var: &str) -> Result<String, BackendError> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(BackendError::MissingCredentials(var.to_string())),
    }
}

/// Fold fragments into cumulative snapshots. The first error is forwarded
/// and ends the stream.
pub fn accumulate(fragments: FragmentStream) -> TranslationStream {
    fragments
        .scan((String::new(), false), |(reply, failed), item| {
            if *failed {
                return futures::future::ready(None);
            }
            let next = match item {
                Ok(fragment) => {
                    reply.push_str(&fragment);
                    Ok(PartialTranslation(reply.clone()))
                }
                Err(e) => {
                    *failed = true;
                    Err(e)
                }
            };
            futures::future::ready(Some(next))
        })
        .boxed()
}
