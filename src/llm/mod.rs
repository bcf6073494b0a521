//! Chat-model abstraction shared by every LLM call site.
//!
//! Each call is a [`CompletionRequest`] built from a prompt template, so the
//! classifier, rewriter, early-exit replies and the final answer all go
//! through the same two trait methods.

mod openai;

pub use openai::OpenAIChat;

use crate::config::{PromptKind, Prompts};
use crate::error::Result;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::pin::Pin;

/// A stream of generated text fragments, in order.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One turn of the conversation, as sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A fully rendered request to a chat model.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Template the request was rendered from.
    pub kind: PromptKind,
    pub model: String,
    pub system: String,
    /// Prior turns followed by the rendered user prompt.
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    /// Text to emit before the generated tokens.
    pub preamble: Option<String>,
}

impl CompletionRequest {
    /// Render the template for `kind` and append its user prompt after `history`.
    pub fn from_template(
        prompts: &Prompts,
        kind: PromptKind,
        model: &str,
        vars: &HashMap<String, String>,
        history: &[ChatMessage],
    ) -> Self {
        let rendered = prompts.render_template(kind, vars);
        let mut messages = history.to_vec();
        messages.push(ChatMessage::user(rendered.user));

        Self {
            kind,
            model: model.to_string(),
            system: rendered.system,
            messages,
            temperature: rendered.temperature,
            preamble: rendered.preamble,
        }
    }

    /// The final user prompt.
    pub fn prompt(&self) -> &str {
        self.messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

/// A chat model that can answer in one piece or as a token stream.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run the request and return the whole reply.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// Run the request and stream the reply.
    async fn stream(&self, request: CompletionRequest) -> Result<TokenStream>;
}

/// Build a template variable map from `(slot, value)` pairs.
pub fn vars<const N: usize>(pairs: [(&str, String); N]) -> HashMap<String, String> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_serde() {
        let msg: ChatMessage =
            serde_json::from_str(r#"{"role":"assistant","content":"Hi there"}"#).unwrap();
        assert_eq!(msg, ChatMessage::assistant("Hi there"));
        assert!(serde_json::from_str::<ChatMessage>(r#"{"role":"robot","content":"x"}"#).is_err());
    }

    #[test]
    fn test_request_from_template_appends_prompt_after_history() {
        let prompts = Prompts::default();
        let history = vec![ChatMessage::user("hello"), ChatMessage::assistant("hi!")];
        let request = CompletionRequest::from_template(
            &prompts,
            PromptKind::NotRelevant,
            "gpt-test",
            &vars([("question", "What's the weather?".to_string())]),
            &history,
        );

        assert_eq!(request.model, "gpt-test");
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[0], history[0]);
        assert_eq!(request.messages[2].role, Role::User);
        assert!(request.prompt().contains("Question: What's the weather?"));
        assert!(request.system.contains("Jason Bent"));
    }
}
