use thiserror::Error;

/// Failure of a single model call. Never reaches the caller of the
/// pipeline: it is turned into a fallback diagram plus a warning.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("AI is not configured (provider, model and API key are required)")]
    NotConfigured,
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("build LLM: {0}")]
    Build(String),
    #[error("chat: {0}")]
    Chat(String),
    #[error("LLM returned empty text")]
    EmptyResponse,
}

#[derive(Debug, Error)]
pub enum FlowchartError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Unexpected(String),
}

impl FlowchartError {
    /// HTTP-style status for the failure.
    pub fn status_code(&self) -> u16 {
        match self {
            FlowchartError::InvalidRequest(_) => 400,
            FlowchartError::Unexpected(_) => 500,
        }
    }
}

impl From<serde_json::Error> for FlowchartError {
    fn from(e: serde_json::Error) -> Self {
        FlowchartError::Unexpected(e.to_string())
    }
}
