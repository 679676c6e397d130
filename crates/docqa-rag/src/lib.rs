//! Retrieval-augmented answering over a [`docqa_vector::VectorStore`].
//!
//! Documents are chunked, embedded and indexed; queries are embedded,
//! searched, de-duplicated and handed to a generator with numbered citations.

pub mod pipeline;
pub mod prompt;
pub mod retry;
pub mod service;

pub use pipeline::{dedupe_overlapping, PipelineOptions, RagPipeline};
pub use retry::RetryPolicy;
