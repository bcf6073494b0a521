//! Retrieval gateway: embeddings, transcript search and the product join.

use crate::embedding::Embedder;
use crate::error::Result;
use crate::store::{Product, ProductCatalog, TranscriptChunk, TranscriptStore};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Front for the embedding model, the transcript index and the catalog.
pub struct RetrievalGateway {
    embedder: Arc<dyn Embedder>,
    transcripts: Arc<dyn TranscriptStore>,
    catalog: Arc<dyn ProductCatalog>,
    search_limit: usize,
    product_limit: usize,
}

impl RetrievalGateway {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        transcripts: Arc<dyn TranscriptStore>,
        catalog: Arc<dyn ProductCatalog>,
    ) -> Self {
        Self {
            embedder,
            transcripts,
            catalog,
            search_limit: 5,
            product_limit: 20,
        }
    }

    /// Set the number of chunks returned by [`search`](Self::search).
    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    /// Set the maximum number of related products.
    pub fn with_product_limit(mut self, limit: usize) -> Self {
        self.product_limit = limit;
        self
    }

    /// Embed `text`. Errors propagate.
    #[instrument(skip(self, text), fields(model = self.embedder.model()))]
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embedder.embed(text).await
    }

    /// Nearest transcript chunks, closest first.
    ///
    /// An unreachable store yields no chunks; other store errors propagate.
    #[instrument(skip(self, embedding))]
    pub async fn search(&self, embedding: &[f32]) -> Result<Vec<TranscriptChunk>> {
        let mut chunks = match self.transcripts.search(embedding, self.search_limit).await {
            Ok(chunks) => chunks,
            Err(e) if e.is_unavailable() => {
                warn!("Transcript store unavailable, continuing without context: {}", e);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        chunks.sort_by(|a, b| {
            b.similarity_score
                .partial_cmp(&a.similarity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        chunks.truncate(self.search_limit);

        debug!("Retrieved {} chunks", chunks.len());
        Ok(chunks)
    }

    /// Products featured in the videos behind `chunks`.
    ///
    /// Never fails: lookup errors are logged and yield no products.
    #[instrument(skip(self, chunks), fields(chunks = chunks.len()))]
    pub async fn related_products(&self, chunks: &[TranscriptChunk]) -> Vec<Product> {
        let video_ids = distinct_ids(chunks);
        if video_ids.is_empty() {
            return Vec::new();
        }

        match self.catalog.related_products(&video_ids, self.product_limit).await {
            Ok(products) => {
                debug!("Found {} related products", products.len());
                products
            }
            Err(e) => {
                warn!("Product lookup failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Check the transcript store is reachable.
    pub async fn health_check(&self) -> Result<()> {
        self.transcripts.health_check().await
    }
}

/// Chunk ids without repeats, in retrieval order.
pub fn distinct_ids(chunks: &[TranscriptChunk]) -> Vec<String> {
    let mut seen = HashSet::new();
    chunks
        .iter()
        .filter(|c| seen.insert(c.id.as_str()))
        .map(|c| c.id.clone())
        .collect()
}
