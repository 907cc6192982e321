use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("missing credentials: environment variable {0} is not set")]
    MissingCredentials(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("stream ended before the backend signalled completion")]
    Truncated,
}

impl BackendError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => BackendError::Authentication(body.to_string()),
            429 => BackendError::RateLimited,
            _ => BackendError::Api {
                status,
                message: body.to_string(),
            },
        }
    }
}
