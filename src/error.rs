use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    #[error("LLM API error: {0}")]
    LlmApi(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Relevance / comment count mismatch: expected {expected}, received {received}")]
    RelevanceMismatch { expected: usize, received: usize },

    #[error("Malformed scoring response: {0}")]
    MalformedResponse(String),

    #[error("Could not render comment body: {0}")]
    Render(String),

    #[error("Report delivery failed: {0}")]
    Delivery(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Fatal errors abort the whole run; the rest degrade to a disabled
    /// stage or an operator warning.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Config(_) | Error::Delivery(_))
    }
}
