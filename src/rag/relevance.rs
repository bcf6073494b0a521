//! Question triage before retrieval.

use crate::config::{PromptKind, Prompts};
use crate::error::Result;
use crate::llm::{vars, ChatMessage, CompletionRequest, LanguageModel};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// How the assistant should treat a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelevanceLabel {
    Greeting,
    Relevant,
    Inappropriate,
    NotRelevant,
}

impl RelevanceLabel {
    /// Parse classifier output. Anything unrecognized is treated as relevant.
    pub fn parse(output: &str) -> Self {
        match output.trim() {
            "GREETING" => Self::Greeting,
            "INAPPROPRIATE" => Self::Inappropriate,
            "NOT_RELEVANT" => Self::NotRelevant,
            _ => Self::Relevant,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "GREETING",
            Self::Relevant => "RELEVANT",
            Self::Inappropriate => "INAPPROPRIATE",
            Self::NotRelevant => "NOT_RELEVANT",
        }
    }
}

impl fmt::Display for RelevanceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Labels a question with one non-streaming model call.
pub struct RelevanceClassifier {
    model: Arc<dyn LanguageModel>,
    prompts: Arc<Prompts>,
    model_name: String,
    history_window: usize,
}

impl RelevanceClassifier {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        prompts: Arc<Prompts>,
        model_name: impl Into<String>,
        history_window: usize,
    ) -> Self {
        Self {
            model,
            prompts,
            model_name: model_name.into(),
            history_window,
        }
    }

    /// Build the classification request for `question`.
    ///
    /// Only the most recent `history_window` turns are included, as JSON.
    pub fn request(&self, question: &str, history: &[ChatMessage]) -> Result<CompletionRequest> {
        let recent = &history[history.len().saturating_sub(self.history_window)..];
        let history_json = serde_json::to_string(recent)?;

        Ok(CompletionRequest::from_template(
            &self.prompts,
            PromptKind::Relevance,
            &self.model_name,
            &vars([
                ("history", history_json),
                ("question", question.to_string()),
            ]),
            &[],
        ))
    }

    #[instrument(skip(self, history), fields(history_len = history.len()))]
    pub async fn classify(&self, question: &str, history: &[ChatMessage]) -> Result<RelevanceLabel> {
        let request = self.request(question, history)?;
        let output = self.model.complete(request).await?;
        let label = RelevanceLabel::parse(&output);
        debug!("Classifier replied {:?}, label {}", output.trim(), label);
        Ok(label)
    }
}
