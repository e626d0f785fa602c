use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model API error ({status}): {message}")]
    ModelApi {
        status: u16,
        message: String,
        /// Delay requested by the provider, from a `retry-after` header.
        retry_after: Option<Duration>,
    },

    #[error("Model provider rejected the request: {0}")]
    ModelRejected(String),

    #[error("NewsAPI error: {0}")]
    NewsApi(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database connection error: {0}")]
    Connection(#[from] tokio_rusqlite::Error),

    #[error("Feed parse error: {0}")]
    FeedParse(#[from] feed_rs::parser::ParseFeedError),

    #[error("OPML error: {0}")]
    Opml(#[from] opml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Provider rejected the credentials; retrying cannot help.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, AppError::ModelApi { status: 401 | 403, .. })
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
