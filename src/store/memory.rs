//! In-memory store implementation.
//!
//! Useful for testing and small catalogs.

use super::{
    cosine_similarity, Product, ProductCatalog, ProductOrder, TranscriptChunk, TranscriptStore,
};
use crate::error::{Result, ShopwrightError};
use async_trait::async_trait;
use std::sync::RwLock;

/// In-memory transcript store and product catalog.
#[derive(Default)]
pub struct MemoryStore {
    chunks: RwLock<Vec<(Vec<f32>, TranscriptChunk)>>,
    products: RwLock<Vec<Product>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transcript chunk with its embedding.
    pub fn insert_chunk(&self, embedding: Vec<f32>, chunk: TranscriptChunk) -> Result<()> {
        self.chunks
            .write()
            .map_err(|e| ShopwrightError::Store(format!("Failed to acquire lock: {}", e)))?
            .push((embedding, chunk));
        Ok(())
    }

    /// Add a product to the catalog.
    pub fn insert_product(&self, product: Product) -> Result<()> {
        self.products
            .write()
            .map_err(|e| ShopwrightError::Store(format!("Failed to acquire lock: {}", e)))?
            .push(product);
        Ok(())
    }
}

#[async_trait]
impl TranscriptStore for MemoryStore {
    async fn search(&self, embedding: &[f32], limit: usize) -> Result<Vec<TranscriptChunk>> {
        let chunks = self
            .chunks
            .read()
            .map_err(|e| ShopwrightError::Store(format!("Failed to acquire lock: {}", e)))?;

        let mut results: Vec<TranscriptChunk> = chunks
            .iter()
            .map(|(vector, chunk)| TranscriptChunk {
                similarity_score: f64::from(cosine_similarity(embedding, vector)),
                ..chunk.clone()
            })
            .collect();

        results.sort_by(|a, b| {
            b.similarity_score
                .partial_cmp(&a.similarity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);

        Ok(results)
    }
}

#[async_trait]
impl ProductCatalog for MemoryStore {
    async fn related_products(&self, video_ids: &[String], limit: usize) -> Result<Vec<Product>> {
        let products = self
            .products
            .read()
            .map_err(|e| ShopwrightError::Store(format!("Failed to acquire lock: {}", e)))?;

        Ok(products
            .iter()
            .filter(|p| video_ids.iter().any(|id| p.video_id.contains(id.as_str())))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_products(&self, order: ProductOrder) -> Result<Vec<Product>> {
        let mut products = self
            .products
            .read()
            .map_err(|e| ShopwrightError::Store(format!("Failed to acquire lock: {}", e)))?
            .clone();

        if order == ProductOrder::ByTags {
            products.sort_by(|a, b| a.tags.join(",").cmp(&b.tags.join(",")));
        }
        Ok(products)
    }
}
