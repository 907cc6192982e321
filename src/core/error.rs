//! TC-007: Pipeline error taxonomy.
//!
//! Compile, runtime and toolchain failures are not errors here: they are
//! returned as [`ExecutionResult`](super::types::ExecutionResult) data.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid backend selection '{0}' (expected one of: GPT, Claude)")]
    InvalidSelection(String),

    #[error("translation failed ({backend}): {message}")]
    TranslationChannelFailure { backend: String, message: String },

    #[error("cancelled")]
    Cancelled,

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::Io(e.to_string())
    }
}
