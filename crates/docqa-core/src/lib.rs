pub mod chunker;
pub mod config;
pub mod documents;
pub mod error;
pub mod logging;
pub mod traits;
pub mod types;

pub use chunker::{Chunker, ChunkingConfig};
pub use error::{Error, Result};
pub use traits::{Embedder, Generator};
pub use types::{CharSpan, Chunk, Document, IndexEntry, IngestReport, QueryAnswer, QueryResult, RetrievalContext, SourceRef};
