//! Configuration module for Shopwright.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{default_variables, PromptKind, PromptTemplate, Prompts, RenderedPrompt};
pub use settings::{
    DatabaseSettings, EmbeddingSettings, GeneralSettings, OpenAISettings, PromptSettings,
    RagSettings, ServerSettings, Settings, StreamFormat,
};
