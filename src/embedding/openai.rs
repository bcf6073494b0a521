//! OpenAI embeddings implementation.

use super::Embedder;
use crate::config::EmbeddingSettings;
use crate::error::{Result, ShopwrightError};
use async_openai::config::OpenAIConfig;
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_openai::Client;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// OpenAI has a limit on inputs per request.
const BATCH_SIZE: usize = 100;

/// OpenAI-based embedder.
pub struct OpenAIEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
    dimensions: Option<u32>,
}

impl OpenAIEmbedder {
    /// Create an embedder on a shared client.
    pub fn new(client: Client<OpenAIConfig>, settings: &EmbeddingSettings) -> Self {
        Self {
            client,
            model: settings.model.clone(),
            dimensions: settings.dimensions,
        }
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ShopwrightError::Embedding("Empty embedding response".to_string()))
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts with {}", texts.len(), self.model);

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let mut args = CreateEmbeddingRequestArgs::default();
            args.model(&self.model)
                .input(EmbeddingInput::StringArray(chunk.to_vec()));
            // ada-002 rejects the dimensions parameter
            if let Some(dimensions) = self.dimensions {
                args.dimensions(dimensions);
            }
            let request = args
                .build()
                .map_err(|e| ShopwrightError::Embedding(format!("Failed to build request: {}", e)))?;

            let response = self.client.embeddings().create(request).await.map_err(|e| {
                ShopwrightError::OpenAI(format!("Embedding API error: {}", e))
            })?;

            // Sort by index to ensure correct order
            let mut embeddings: Vec<_> = response.data.into_iter().collect();
            embeddings.sort_by_key(|e| e.index);

            if embeddings.len() != chunk.len() {
                return Err(ShopwrightError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    chunk.len(),
                    embeddings.len()
                )));
            }

            all_embeddings.extend(embeddings.into_iter().map(|e| e.embedding));
        }

        debug!("Generated {} embeddings", all_embeddings.len());
        Ok(all_embeddings)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OpenAISettings;
    use crate::openai::create_client;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> Client<OpenAIConfig> {
        let settings = OpenAISettings {
            api_base: Some(server.uri()),
            api_key: Some("test-key".to_string()),
            ..OpenAISettings::default()
        };
        create_client(&settings).unwrap()
    }

    #[tokio::test]
    async fn test_embed_returns_vector_in_index_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(json!({ "model": "text-embedding-ada-002" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "model": "text-embedding-ada-002",
                "data": [
                    { "object": "embedding", "index": 1, "embedding": [0.0, 1.0] },
                    { "object": "embedding", "index": 0, "embedding": [1.0, 0.0] }
                ],
                "usage": { "prompt_tokens": 4, "total_tokens": 4 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let embedder = OpenAIEmbedder::new(client_for(&server), &EmbeddingSettings::default());
        let vectors = embedder
            .embed_batch(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();

        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(embedder.model(), "text-embedding-ada-002");
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_request() {
        let server = MockServer::start().await;
        let embedder = OpenAIEmbedder::new(client_for(&server), &EmbeddingSettings::default());
        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
