//! Shopwright - woodworking shop assistant
//!
//! A retrieval-augmented chat service that answers woodworking questions
//! from a library of video transcripts and links the products featured in
//! those videos, plus the product listing behind the shop page.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Settings and prompt templates
//! - `llm` - Chat model abstraction (OpenAI implementation)
//! - `embedding` - Embedding generation
//! - `store` - Transcript search and product catalog (Postgres/pgvector)
//! - `rag` - Triage, query rewriting, retrieval and context formatting
//! - `orchestrator` - One chat turn from question to token stream
//! - `shop` - Shop page listing
//! - `server` - HTTP routes
//!
//! # Example
//!
//! ```rust,no_run
//! use shopwright::config::Settings;
//! use shopwright::llm::ChatMessage;
//! use shopwright::orchestrator::Orchestrator;
//! use shopwright::store::PgStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let store = Arc::new(PgStore::connect(&settings.database).await?);
//!     let orchestrator = Orchestrator::openai(&settings, store.clone(), store)?;
//!
//!     let reply = orchestrator
//!         .respond(&[ChatMessage::user("How do I square up a crosscut sled?")])
//!         .await?;
//!     println!("{}", reply.collect_text().await?);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod openai;
pub mod orchestrator;
pub mod rag;
pub mod server;
pub mod shop;
pub mod store;

pub use error::{Result, ShopwrightError};
