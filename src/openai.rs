//! OpenAI client configuration with sensible defaults.

use crate::config::OpenAISettings;
use crate::error::Result;
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for OpenAI API requests, matching the per-request chat budget.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Create an OpenAI client from settings with the default timeout.
pub fn create_client(settings: &OpenAISettings) -> Result<Client<OpenAIConfig>> {
    create_client_with_timeout(settings, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create an OpenAI client with a custom timeout.
///
/// The API key falls back to OPENAI_API_KEY when the settings leave it unset.
pub fn create_client_with_timeout(
    settings: &OpenAISettings,
    timeout: Duration,
) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder().timeout(timeout).build()?;

    let mut config = OpenAIConfig::default();
    if let Some(base) = settings.api_base.as_deref().filter(|b| !b.is_empty()) {
        config = config.with_api_base(base);
    }
    if let Some(key) = settings.api_key.as_deref().filter(|k| !k.is_empty()) {
        config = config.with_api_key(key);
    }

    Ok(Client::with_config(config).with_http_client(http_client))
}
