//! Durable vector index with cosine similarity search.

pub mod persist;
pub mod similarity;
pub mod store;

pub use similarity::cosine_similarity;
pub use store::{LoadReport, VectorStore};
