//! Store abstraction for transcript chunks and the product catalog.
//!
//! Provides trait-based interfaces so the pipeline can run against Postgres
//! in production and an in-memory store in tests.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{quote_ident, PgStore, TableName};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One retrievable unit of a video transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptChunk {
    /// Source identifier. Also the key products are joined on.
    pub id: String,
    pub text: String,
    /// Video title.
    pub title: String,
    /// Source video url.
    pub url: String,
    /// Position of this chunk within its transcript.
    pub chunk_index: i64,
    /// `1 - cosine_distance`, higher is closer.
    pub similarity_score: f64,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: String,
    /// Comma-separated tags from the catalog, split and trimmed, in order.
    pub tags: Vec<String>,
    pub link: String,
    /// Compound field containing the ids of the videos featuring the product.
    pub video_id: String,
    /// Base64 image bytes, only loaded for the shop listing.
    pub image_data: Option<String>,
}

/// Ordering for catalog listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductOrder {
    /// Storage order.
    #[default]
    Unordered,
    /// Ordered by the raw tags column.
    ByTags,
}

/// Nearest-neighbour search over embedded transcript chunks.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Return up to `limit` chunks ordered by similarity, closest first.
    async fn search(&self, embedding: &[f32], limit: usize) -> Result<Vec<TranscriptChunk>>;

    /// Check the store is reachable.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Product lookups.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Products whose `video_id` field contains any of `video_ids` as a substring.
    async fn related_products(&self, video_ids: &[String], limit: usize) -> Result<Vec<Product>>;

    /// Every product in the catalog.
    async fn list_products(&self, order: ProductOrder) -> Result<Vec<Product>>;
}

/// Split the catalog's comma-separated tags column.
pub fn split_tags(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    raw.split(',').map(|tag| tag.trim().to_string()).collect()
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_split_tags() {
        assert_eq!(
            split_tags("Clamps , Jigs,Crosscut Sled Build"),
            vec!["Clamps", "Jigs", "Crosscut Sled Build"]
        );
        assert!(split_tags("  ").is_empty());
    }
}
