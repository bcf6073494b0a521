//! Response orchestrator for Shopwright.
//!
//! Runs one chat request from classification to a token stream:
//! classify, then either answer directly or rewrite, embed, search, format
//! the retrieved context and generate.

use crate::config::{PromptKind, Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{Result, ShopwrightError};
use crate::llm::{vars, ChatMessage, CompletionRequest, LanguageModel, OpenAIChat, TokenStream};
use crate::openai::create_client_with_timeout;
use crate::rag::{
    assemble_context, format_product_links, format_timestamp_guide, format_transcripts,
    video_data, QueryRewriter, RelevanceClassifier, RelevanceLabel, RetrievalGateway,
};
use crate::store::{ProductCatalog, TranscriptStore};
use futures::{stream, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, instrument, warn};

/// Where a request ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Answered from a template without retrieval.
    EarlyExit,
    /// Retrieval found nothing; answered from general knowledge.
    NoContext,
    /// Answered from retrieved context.
    Answered,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::EarlyExit => write!(f, "early_exit"),
            Stage::NoContext => write!(f, "no_context"),
            Stage::Answered => write!(f, "answered"),
        }
    }
}

/// The outcome of [`Orchestrator::respond`].
pub struct ChatReply {
    pub label: RelevanceLabel,
    pub stage: Stage,
    /// Generated text, preamble first. Ends early if the deadline passes.
    pub tokens: TokenStream,
}

impl fmt::Debug for ChatReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatReply")
            .field("label", &self.label)
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}

impl ChatReply {
    /// Drain the token stream into one string.
    pub async fn collect_text(self) -> Result<String> {
        let mut text = String::new();
        let mut tokens = self.tokens;
        while let Some(token) = tokens.next().await {
            text.push_str(&token?);
        }
        Ok(text)
    }
}

/// The main orchestrator for a chat turn.
pub struct Orchestrator {
    prompts: Arc<Prompts>,
    model: Arc<dyn LanguageModel>,
    chat_model: String,
    classifier: RelevanceClassifier,
    rewriter: QueryRewriter,
    retrieval: RetrievalGateway,
    request_timeout: Duration,
    timestamp_links: bool,
}

impl Orchestrator {
    /// Create an orchestrator from explicit components.
    pub fn new(
        settings: &Settings,
        prompts: Prompts,
        model: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        transcripts: Arc<dyn TranscriptStore>,
        catalog: Arc<dyn ProductCatalog>,
    ) -> Self {
        let prompts = Arc::new(prompts);
        let chat_model = settings.openai.chat_model.clone();

        let classifier = RelevanceClassifier::new(
            model.clone(),
            prompts.clone(),
            chat_model.clone(),
            settings.rag.history_window,
        );
        let rewriter = QueryRewriter::new(model.clone(), prompts.clone(), chat_model.clone());
        let retrieval = RetrievalGateway::new(embedder, transcripts, catalog)
            .with_search_limit(settings.rag.search_limit)
            .with_product_limit(settings.rag.product_limit);

        Self {
            prompts,
            model,
            chat_model,
            classifier,
            rewriter,
            retrieval,
            request_timeout: settings.server.request_timeout(),
            timestamp_links: settings.rag.timestamp_links,
        }
    }

    /// Create an orchestrator backed by OpenAI chat and embeddings.
    pub fn openai(
        settings: &Settings,
        transcripts: Arc<dyn TranscriptStore>,
        catalog: Arc<dyn ProductCatalog>,
    ) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let client = create_client_with_timeout(&settings.openai, settings.server.request_timeout())?;
        let model: Arc<dyn LanguageModel> = Arc::new(OpenAIChat::new(client.clone()));
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::new(client, &settings.embedding));

        info!(
            "Using chat model {} and embedding model {}",
            settings.openai.chat_model, settings.embedding.model
        );

        Ok(Self::new(settings, prompts, model, embedder, transcripts, catalog))
    }

    /// Override the per-request deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn retrieval(&self) -> &RetrievalGateway {
        &self.retrieval
    }

    /// Answer the last message of `messages`, treating the rest as history.
    #[instrument(skip(self, messages), fields(turns = messages.len()))]
    pub async fn respond(&self, messages: &[ChatMessage]) -> Result<ChatReply> {
        let Some((current, history)) = messages.split_last() else {
            return Err(ShopwrightError::InvalidInput("messages must not be empty".to_string()));
        };
        let question = current.content.as_str();
        let deadline = Instant::now() + self.request_timeout;

        let label = within(deadline, self.classifier.classify(question, history)).await?;
        info!("Question classified as {}", label);

        let early_exit = match label {
            RelevanceLabel::Greeting => Some(self.request(PromptKind::Greeting, HashMap::new(), &[])),
            RelevanceLabel::Inappropriate => {
                Some(self.request(PromptKind::Inappropriate, HashMap::new(), &[]))
            }
            RelevanceLabel::NotRelevant => Some(self.request(
                PromptKind::NotRelevant,
                vars([("question", question.to_string())]),
                &[],
            )),
            RelevanceLabel::Relevant => None,
        };
        if let Some(request) = early_exit {
            return self.reply(label, Stage::EarlyExit, request, deadline).await;
        }

        let query = within(deadline, self.rewriter.rewrite(question, history)).await?;
        let embedding = within(deadline, self.retrieval.embed(&query)).await?;
        let chunks = within(deadline, self.retrieval.search(&embedding)).await?;

        if chunks.is_empty() {
            info!("No transcript chunks found, answering without references");
            let request = self.request(
                PromptKind::NoContext,
                vars([("question", question.to_string())]),
                history,
            );
            return self.reply(label, Stage::NoContext, request, deadline).await;
        }

        let (products, transcripts) = within(deadline, async {
            Ok(tokio::join!(
                self.retrieval.related_products(&chunks),
                async { format_transcripts(&chunks) }
            ))
        })
        .await?;

        let product_section = format_product_links(&products);
        let guide = if self.timestamp_links {
            format_timestamp_guide(&chunks)
        } else {
            None
        };
        let videos = video_data(&chunks);
        debug!(
            "Context covers {} videos, {} products: {:?}",
            videos.len(),
            products.len(),
            videos
        );

        let context = assemble_context(&transcripts, &product_section, guide.as_deref());
        let request = self.request(
            PromptKind::Answer,
            vars([("context", context), ("question", question.to_string())]),
            history,
        );
        self.reply(label, Stage::Answered, request, deadline).await
    }

    fn request(
        &self,
        kind: PromptKind,
        vars: HashMap<String, String>,
        history: &[ChatMessage],
    ) -> CompletionRequest {
        CompletionRequest::from_template(&self.prompts, kind, &self.chat_model, &vars, history)
    }

    async fn reply(
        &self,
        label: RelevanceLabel,
        stage: Stage,
        request: CompletionRequest,
        deadline: Instant,
    ) -> Result<ChatReply> {
        info!("Generating {} reply with the {} template", stage, request.kind);
        let tokens = self.generate(request, deadline).await?;
        Ok(ChatReply {
            label,
            stage,
            tokens,
        })
    }

    /// Start generation and wait for the first token.
    ///
    /// An upstream failure before the first token is returned as an error so
    /// nothing has been sent to the client yet.
    async fn generate(&self, request: CompletionRequest, deadline: Instant) -> Result<TokenStream> {
        let preamble = request.preamble.clone();
        let mut upstream = within(deadline, self.model.stream(request)).await?;

        let first = timeout_at(deadline, upstream.next())
            .await
            .map_err(|_| expired())?
            .transpose()?;

        let head: Vec<Result<String>> = preamble.into_iter().chain(first).map(Ok).collect();
        Ok(Box::pin(stream::iter(head).chain(with_deadline(upstream, deadline))))
    }
}

fn expired() -> ShopwrightError {
    ShopwrightError::Timeout("request deadline exceeded".to_string())
}

async fn within<T, F>(deadline: Instant, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    timeout_at(deadline, fut).await.map_err(|_| expired())?
}

/// Yield tokens until the upstream ends, fails, or `deadline` passes.
fn with_deadline(tokens: TokenStream, deadline: Instant) -> TokenStream {
    Box::pin(stream::unfold(Some(tokens), move |state| async move {
        let mut tokens = state?;
        match timeout_at(deadline, tokens.next()).await {
            Ok(Some(Ok(token))) => Some((Ok(token), Some(tokens))),
            Ok(Some(Err(e))) => Some((Err(e), None)),
            Ok(None) => None,
            Err(_) => {
                warn!("Request deadline passed mid-stream, ending response");
                Some((Err(expired()), None))
            }
        }
    }))
}
