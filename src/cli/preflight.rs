//! Pre-flight checks before starting the server or answering a question.
//!
//! Validates that required configuration is available before starting
//! operations that would otherwise fail on the first request.

use crate::config::Settings;
use crate::error::{Result, ShopwrightError};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Serving needs the API key and a database url.
    Serve,
    /// Asking a question needs the same.
    Ask,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Serve | Operation::Ask => {
            check_api_key(settings)?;
            settings.database.resolve_url()?;
        }
    }
    Ok(())
}

/// Check if an OpenAI API key is configured.
fn check_api_key(settings: &Settings) -> Result<()> {
    if settings
        .openai
        .api_key
        .as_deref()
        .is_some_and(|key| !key.is_empty())
    {
        return Ok(());
    }

    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(ShopwrightError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        Err(_) => Err(ShopwrightError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_key_and_url_pass() {
        let mut settings = Settings::default();
        settings.openai.api_key = Some("sk-test".to_string());
        settings.database.url = Some("postgres://localhost/shop".to_string());
        assert!(check(Operation::Serve, &settings).is_ok());
    }
}
