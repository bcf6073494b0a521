//! Search query rewriting.

use crate::config::{PromptKind, Prompts};
use crate::error::Result;
use crate::llm::{vars, ChatMessage, CompletionRequest, LanguageModel};
use futures::TryStreamExt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Turns a conversational question into a standalone search query.
pub struct QueryRewriter {
    model: Arc<dyn LanguageModel>,
    prompts: Arc<Prompts>,
    model_name: String,
}

impl QueryRewriter {
    pub fn new(model: Arc<dyn LanguageModel>, prompts: Arc<Prompts>, model_name: impl Into<String>) -> Self {
        Self {
            model,
            prompts,
            model_name: model_name.into(),
        }
    }

    pub fn request(&self, question: &str, history: &[ChatMessage]) -> Result<CompletionRequest> {
        Ok(CompletionRequest::from_template(
            &self.prompts,
            PromptKind::Rewrite,
            &self.model_name,
            &vars([
                ("question", question.to_string()),
                ("history", serde_json::to_string(history)?),
            ]),
            &[],
        ))
    }

    /// Rewrite `question` using the whole history.
    ///
    /// The reply is streamed and accumulated here; callers only see the
    /// final query. An empty rewrite falls back to the question itself.
    #[instrument(skip(self, history), fields(history_len = history.len()))]
    pub async fn rewrite(&self, question: &str, history: &[ChatMessage]) -> Result<String> {
        let request = self.request(question, history)?;
        let rewritten: String = self.model.stream(request).await?.try_collect().await?;
        let rewritten = rewritten.trim();

        if rewritten.is_empty() {
            debug!("Empty rewrite, searching with the original question");
            return Ok(question.to_string());
        }

        debug!("Rewrote query to {:?}", rewritten);
        Ok(rewritten.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShopwrightError;
    use crate::llm::TokenStream;
    use async_trait::async_trait;
    use futures::stream;

    struct ScriptedStream(Vec<Result<String>>);

    #[async_trait]
    impl LanguageModel for ScriptedStream {
        async fn complete(&self, _request: CompletionRequest) -> Result<String> {
            unreachable!("rewriter always streams")
        }

        async fn stream(&self, request: CompletionRequest) -> Result<TokenStream> {
            assert_eq!(request.kind, PromptKind::Rewrite);
            let tokens: Vec<Result<String>> = self
                .0
                .iter()
                .map(|t| match t {
                    Ok(s) => Ok(s.clone()),
                    Err(e) => Err(ShopwrightError::OpenAI(e.to_string())),
                })
                .collect();
            Ok(Box::pin(stream::iter(tokens)))
        }
    }

    fn rewriter(tokens: Vec<Result<String>>) -> QueryRewriter {
        QueryRewriter::new(
            Arc::new(ScriptedStream(tokens)),
            Arc::new(Prompts::default()),
            "gpt-test",
        )
    }

    #[tokio::test]
    async fn test_rewrite_accumulates_tokens() {
        let rewriter = rewriter(vec![
            Ok(" How to build".to_string()),
            Ok(" a crosscut".to_string()),
            Ok(" sled\n".to_string()),
        ]);
        let query = rewriter.rewrite("how do I make one?", &[]).await.unwrap();
        assert_eq!(query, "How to build a crosscut sled");
    }

    #[tokio::test]
    async fn test_empty_rewrite_falls_back() {
        let rewriter = rewriter(vec![Ok("  ".to_string())]);
        let query = rewriter.rewrite("what glue?", &[]).await.unwrap();
        assert_eq!(query, "what glue?");
    }

    #[tokio::test]
    async fn test_stream_error_propagates() {
        let rewriter = rewriter(vec![
            Ok("partial".to_string()),
            Err(ShopwrightError::OpenAI("boom".to_string())),
        ]);
        assert!(rewriter.rewrite("q", &[]).await.is_err());
    }

    #[test]
    fn test_request_includes_full_history() {
        let rewriter = rewriter(vec![]);
        let history: Vec<ChatMessage> = (0..7)
            .map(|i| ChatMessage::assistant(format!("turn {}", i)))
            .collect();
        let request = rewriter.request("and the blade?", &history).unwrap();
        assert!(request.prompt().contains("turn 0"));
        assert!(request.prompt().contains("Original query: and the blade?"));
    }
}
