//! Retrieval-augmented answering over the video transcript library.
//!
//! The pieces the orchestrator strings together: triage, query rewriting,
//! retrieval and context formatting.

pub mod context;
pub mod relevance;
pub mod retrieval;
pub mod rewrite;
pub mod timestamps;

pub use context::{
    assemble_context, format_product_links, format_timestamp_guide, format_transcripts,
    parse_product_links, reflow_paragraphs, video_data, TimestampGuide, VideoReference,
};
pub use relevance::{RelevanceClassifier, RelevanceLabel};
pub use retrieval::RetrievalGateway;
pub use rewrite::QueryRewriter;
pub use timestamps::{create_timestamp_url, extract_timestamps, time_to_seconds, TimestampReference};
