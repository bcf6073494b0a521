//! Error types for Shopwright.

use thiserror::Error;

/// Library-level error type for Shopwright operations.
#[derive(Error, Debug)]
pub enum ShopwrightError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Prompt template error: {0}")]
    Prompt(String),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ShopwrightError {
    /// Whether the error means the backing store could not be reached at all,
    /// as opposed to a query that reached it and failed.
    pub fn is_unavailable(&self) -> bool {
        match self {
            ShopwrightError::StoreUnavailable(_) => true,
            ShopwrightError::Database(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::WorkerCrashed
            ),
            _ => false,
        }
    }
}

/// Result type alias for Shopwright operations.
pub type Result<T> = std::result::Result<T, ShopwrightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_classification() {
        assert!(ShopwrightError::StoreUnavailable("down".to_string()).is_unavailable());
        assert!(ShopwrightError::Database(sqlx::Error::PoolTimedOut).is_unavailable());
        assert!(!ShopwrightError::Database(sqlx::Error::RowNotFound).is_unavailable());
        assert!(!ShopwrightError::Embedding("bad".to_string()).is_unavailable());
    }
}
