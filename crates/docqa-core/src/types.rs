//! Domain types shared by the chunker, the vector store and the retrieval pipeline.

use serde::{Deserialize, Serialize};

/// Half-open range `[start, end)` of char offsets into a document's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharSpan {
    pub start: usize,
    pub end: usize,
}

impl CharSpan {
    pub fn new(start: usize, end: usize) -> Self { Self { start, end } }

    pub fn len(&self) -> usize { self.end.saturating_sub(self.start) }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// True when both spans share at least one char.
    pub fn overlaps(&self, other: &CharSpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A source document with its already-extracted text.
///
/// - `id`: blake3 digest of `source_identifier` + `raw_text`
/// - `source_identifier`: filename or path the text came from
/// - `page_boundaries`: char offsets at which each page starts, if known
///
/// Re-ingesting the same `source_identifier` supersedes the previous version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub source_identifier: String,
    pub raw_text: String,
    pub page_boundaries: Option<Vec<usize>>,
}

impl Document {
    pub fn new(source_identifier: impl Into<String>, raw_text: impl Into<String>) -> Self {
        let source_identifier = source_identifier.into();
        let raw_text = raw_text.into();
        let mut hasher = blake3::Hasher::new();
        hasher.update(source_identifier.as_bytes());
        hasher.update(&[0]);
        hasher.update(raw_text.as_bytes());
        let id = hasher.finalize().to_hex().to_string();
        Self { id, source_identifier, raw_text, page_boundaries: None }
    }

    pub fn with_page_boundaries(mut self, boundaries: Vec<usize>) -> Self {
        self.page_boundaries = Some(boundaries);
        self
    }

    /// 1-based page containing `char_offset`, when page boundaries are known.
    pub fn page_at(&self, char_offset: usize) -> Option<usize> {
        page_for_offset(self.page_boundaries.as_deref()?, char_offset)
    }
}

/// 1-based page for `char_offset` given sorted page start offsets.
pub fn page_for_offset(boundaries: &[usize], char_offset: usize) -> Option<usize> {
    if boundaries.is_empty() { return None; }
    let pages_started = boundaries.partition_point(|&b| b <= char_offset);
    Some(pages_started.max(1))
}

/// A bounded contiguous segment of a document; the retrieval unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source_identifier: String,
    pub sequence_index: usize,
    pub char_span: CharSpan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
}

impl Chunk {
    /// Identity of a chunk inside the vector store.
    pub fn key(&self) -> (&str, usize) { (&self.source_identifier, self.sequence_index) }
}

/// One indexed chunk with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

/// A chunk returned by a similarity search. Higher score is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub chunk: Chunk,
    pub score: f32,
}

/// Score-ordered, de-duplicated results used to build a generation prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalContext {
    pub results: Vec<QueryResult>,
}

impl RetrievalContext {
    pub fn len(&self) -> usize { self.results.len() }

    pub fn is_empty(&self) -> bool { self.results.is_empty() }

    pub fn iter(&self) -> std::slice::Iter<'_, QueryResult> { self.results.iter() }
}

/// Summary returned by an ingestion request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub documents_len: usize,
    pub chunks_len: usize,
}

impl std::ops::AddAssign for IngestReport {
    fn add_assign(&mut self, rhs: Self) {
        self.documents_len += rhs.documents_len;
        self.chunks_len += rhs.chunks_len;
    }
}

/// Citation for one context block used in an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub source_identifier: String,
    pub text: String,
    pub char_span: CharSpan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    pub score: f32,
}

impl From<&QueryResult> for SourceRef {
    fn from(r: &QueryResult) -> Self {
        Self {
            source_identifier: r.chunk.source_identifier.clone(),
            text: r.chunk.text.clone(),
            char_span: r.chunk.char_span,
            page: r.chunk.page,
            score: r.score,
        }
    }
}

/// Generated answer plus the sources it was conditioned on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnswer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}
