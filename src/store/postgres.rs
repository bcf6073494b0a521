//! Postgres + pgvector store implementation.
//!
//! Similarity is computed by the vector extension (`<=>` cosine distance); the
//! product join is a substring match of chunk ids against the catalog's
//! compound `video_id` field.

use super::{split_tags, Product, ProductCatalog, ProductOrder, TranscriptChunk, TranscriptStore};
use crate::config::DatabaseSettings;
use crate::error::{Result, ShopwrightError};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pgvector::Vector;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Fully-qualified Postgres table name (schema + table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    schema: String,
    table: String,
}

impl TableName {
    /// Builds a new table identifier.
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Result<Self> {
        let schema = schema.into();
        let table = table.into();
        if schema.trim().is_empty() {
            return Err(ShopwrightError::Config("schema name is required".to_string()));
        }
        if table.trim().is_empty() {
            return Err(ShopwrightError::Config("table name is required".to_string()));
        }
        Ok(Self { schema, table })
    }

    /// Fully-qualified table reference with quoted identifiers.
    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }
}

/// Quotes Postgres identifiers, escaping embedded quotes.
pub fn quote_ident(input: &str) -> String {
    let escaped = input.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// A transcript row as it comes off the wire.
#[derive(Debug, Clone, FromRow)]
struct TranscriptRow {
    id: String,
    text: Option<String>,
    title: Option<String>,
    url: Option<String>,
    chunk_id: Option<i64>,
    similarity_score: Option<f64>,
}

impl TranscriptRow {
    fn into_chunk(self) -> std::result::Result<TranscriptChunk, String> {
        let url = self
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| format!("transcript {} has no url", self.id))?;
        let similarity_score = self
            .similarity_score
            .filter(|s| s.is_finite())
            .ok_or_else(|| format!("transcript {} has no usable similarity score", self.id))?;

        Ok(TranscriptChunk {
            text: self.text.unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            url,
            chunk_index: self.chunk_id.unwrap_or_default(),
            similarity_score,
            id: self.id,
        })
    }
}

/// A catalog row as it comes off the wire.
#[derive(Debug, Clone, FromRow)]
struct ProductRow {
    id: String,
    title: Option<String>,
    tags: Option<String>,
    link: Option<String>,
    video_id: Option<String>,
    image_data: Option<Vec<u8>>,
}

impl ProductRow {
    fn into_product(self) -> std::result::Result<Product, String> {
        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| format!("product {} has no title", self.id))?;

        Ok(Product {
            title,
            tags: self.tags.as_deref().map(split_tags).unwrap_or_default(),
            link: self.link.unwrap_or_default(),
            video_id: self.video_id.unwrap_or_default(),
            image_data: self.image_data.map(|bytes| STANDARD.encode(bytes)),
            id: self.id,
        })
    }
}

/// Keep the rows that validate, logging the rest.
fn validated<R, T>(rows: Vec<R>, convert: fn(R) -> std::result::Result<T, String>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match convert(row) {
            Ok(item) => Some(item),
            Err(reason) => {
                warn!("Dropping malformed row: {}", reason);
                None
            }
        })
        .collect()
}

fn search_sql(table: &TableName) -> String {
    format!(
        "SELECT id::text AS id, text, title, url, chunk_id::bigint AS chunk_id, \
                (1 - (vector <=> $1))::float8 AS similarity_score \
         FROM {} \
         WHERE vector IS NOT NULL \
         ORDER BY vector <=> $1 \
         LIMIT $2",
        table.qualified()
    )
}

fn related_products_sql(table: &TableName, id_count: usize) -> String {
    let conditions = (1..=id_count)
        .map(|n| format!("video_id LIKE '%' || ${} || '%'", n))
        .collect::<Vec<_>>()
        .join(" OR ");
    format!(
        "SELECT id::text AS id, title, tags, link, video_id, NULL::bytea AS image_data \
         FROM {} \
         WHERE {} \
         LIMIT ${}",
        table.qualified(),
        conditions,
        id_count + 1
    )
}

fn list_products_sql(table: &TableName, order: ProductOrder) -> String {
    let order_clause = match order {
        ProductOrder::Unordered => "",
        ProductOrder::ByTags => " ORDER BY tags",
    };
    format!(
        "SELECT id::text AS id, title, tags, link, video_id, image_data FROM {}{}",
        table.qualified(),
        order_clause
    )
}

/// Postgres-backed store for transcripts and products.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    transcripts: TableName,
    products: TableName,
}

impl PgStore {
    /// Build the pool and wait until the database answers.
    #[instrument(skip_all)]
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self> {
        let url = settings.resolve_url()?;

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .idle_timeout(Some(Duration::from_secs(settings.idle_timeout_secs)))
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
            .max_lifetime(Some(Duration::from_secs(settings.max_lifetime_secs)))
            .connect_lazy(&url)?;

        let store = Self::from_pool(pool, settings)?;
        store
            .wait_until_ready(
                settings.connect_retries,
                Duration::from_millis(settings.retry_backoff_ms),
            )
            .await?;

        info!(
            "Connected to Postgres (transcripts: {}, products: {})",
            store.transcripts.qualified(),
            store.products.qualified()
        );
        Ok(store)
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool, settings: &DatabaseSettings) -> Result<Self> {
        Ok(Self {
            pool,
            transcripts: TableName::new(&settings.schema, &settings.transcripts_table)?,
            products: TableName::new(&settings.schema, &settings.products_table)?,
        })
    }

    /// Run the health check up to `attempts` times, sleeping `backoff` in between.
    pub async fn wait_until_ready(&self, attempts: u32, backoff: Duration) -> Result<()> {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.ping().await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < attempts => {
                    warn!("Database not ready (attempt {}/{}): {}", attempt, attempts, e);
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(ShopwrightError::StoreUnavailable(format!(
                        "database unreachable after {} attempts: {}",
                        attempts, e
                    )))
                }
            }
        }
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the pool, waiting for checked-out connections to come back.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl TranscriptStore for PgStore {
    #[instrument(skip(self, embedding), fields(dims = embedding.len()))]
    async fn search(&self, embedding: &[f32], limit: usize) -> Result<Vec<TranscriptChunk>> {
        let limit = i64::try_from(limit)
            .map_err(|_| ShopwrightError::InvalidInput(format!("search limit {} too large", limit)))?;

        let rows: Vec<TranscriptRow> = sqlx::query_as(&search_sql(&self.transcripts))
            .bind(Vector::from(embedding.to_vec()))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        let fetched = rows.len();
        let chunks = validated(rows, TranscriptRow::into_chunk);
        debug!("Vector search returned {} rows, {} valid", fetched, chunks.len());
        Ok(chunks)
    }

    async fn health_check(&self) -> Result<()> {
        self.ping().await
    }
}

#[async_trait]
impl ProductCatalog for PgStore {
    #[instrument(skip(self), fields(ids = video_ids.len()))]
    async fn related_products(&self, video_ids: &[String], limit: usize) -> Result<Vec<Product>> {
        if video_ids.is_empty() {
            return Ok(Vec::new());
        }
        let limit = i64::try_from(limit)
            .map_err(|_| ShopwrightError::InvalidInput(format!("product limit {} too large", limit)))?;

        let sql = related_products_sql(&self.products, video_ids.len());
        let mut query = sqlx::query_as::<_, ProductRow>(&sql);
        for id in video_ids {
            query = query.bind(id);
        }
        let rows = query.bind(limit).fetch_all(&self.pool).await?;

        Ok(validated(rows, ProductRow::into_product))
    }

    #[instrument(skip(self))]
    async fn list_products(&self, order: ProductOrder) -> Result<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&list_products_sql(&self.products, order))
            .fetch_all(&self.pool)
            .await?;

        Ok(validated(rows, ProductRow::into_product))
    }
}
