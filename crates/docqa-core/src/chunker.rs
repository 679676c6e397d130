//! Splits document text into overlapping, bounded segments.
//!
//! Lengths and offsets are measured in chars. A chunk ends at the last
//! paragraph break inside its window, else at the last sentence break, else
//! at a hard cut of `max_length` chars. The next chunk starts `overlap` chars
//! before the previous one ended, so every interior boundary is covered twice.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{page_for_offset, CharSpan, Chunk, Document};

pub const PARAGRAPH_SEPARATOR: &str = "\n\n";
pub const SENTENCE_SEPARATORS: [&str; 4] = [". ", "! ", "? ", ".\n"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_length: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_length: 1024, overlap: 80 }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_length == 0 {
            return Err(Error::InvalidConfig("chunk max_length must be positive".into()));
        }
        if self.overlap >= self.max_length {
            return Err(Error::InvalidConfig(format!(
                "chunk overlap ({}) must be smaller than max_length ({})",
                self.overlap, self.max_length
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    /// Validates the configuration up front so no work starts with bad parameters.
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig { &self.config }

    /// Lazy chunk sequence for a document. Clone the iterator to restart it.
    pub fn chunks<'a>(&self, doc: &'a Document) -> Chunks<'a> {
        Chunks::new(&doc.raw_text, &doc.source_identifier, doc.page_boundaries.as_deref(), self.config)
    }

    pub fn chunk(&self, text: &str, source_identifier: &str) -> Vec<Chunk> {
        Chunks::new(text, source_identifier, None, self.config).collect()
    }
}

/// One-shot form of [`Chunker::chunk`].
pub fn chunk(text: &str, source_identifier: &str, max_length: usize, overlap: usize) -> Result<Vec<Chunk>> {
    Ok(Chunker::new(ChunkingConfig { max_length, overlap })?.chunk(text, source_identifier))
}

#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    source_identifier: &'a str,
    page_boundaries: Option<&'a [usize]>,
    config: ChunkingConfig,
    // Byte offset of every char, plus `text.len()` as a sentinel.
    offsets: Arc<[usize]>,
    start: usize,
    next_index: usize,
    done: bool,
}

impl<'a> Chunks<'a> {
    fn new(text: &'a str, source_identifier: &'a str, page_boundaries: Option<&'a [usize]>, config: ChunkingConfig) -> Self {
        let offsets: Arc<[usize]> = text
            .char_indices()
            .map(|(byte, _)| byte)
            .chain(std::iter::once(text.len()))
            .collect();
        Self {
            text,
            source_identifier,
            page_boundaries,
            config,
            offsets,
            start: 0,
            next_index: 0,
            done: text.trim().is_empty(),
        }
    }

    fn char_len(&self) -> usize { self.offsets.len() - 1 }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.text[self.offsets[start]..self.offsets[end]]
    }

    fn byte_to_char(&self, byte: usize) -> Option<usize> {
        self.offsets.binary_search(&byte).ok()
    }

    /// Char offset right after the last occurrence of `sep` in `[start, hard_end)`.
    fn cut_after(&self, start: usize, hard_end: usize, sep: &str) -> Option<usize> {
        let window = self.slice(start, hard_end);
        let pos = window.rfind(sep)?;
        self.byte_to_char(self.offsets[start] + pos + sep.len())
    }

    /// Preferred end for a chunk starting at `start` whose window ends at `hard_end`.
    ///
    /// A natural boundary is only taken if it leaves the next chunk starting
    /// after `start`, i.e. the cut lies beyond `start + overlap`.
    fn boundary(&self, start: usize, hard_end: usize) -> usize {
        let min_cut = start + self.config.overlap + 1;
        if let Some(cut) = self.cut_after(start, hard_end, PARAGRAPH_SEPARATOR) {
            if cut >= min_cut { return cut; }
        }
        let sentence_cut = SENTENCE_SEPARATORS
            .iter()
            .filter_map(|sep| self.cut_after(start, hard_end, sep))
            .max();
        match sentence_cut {
            Some(cut) if cut >= min_cut => cut,
            _ => hard_end,
        }
    }
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let total = self.char_len();
        if self.done || self.start >= total {
            self.done = true;
            return None;
        }
        let start = self.start;
        let hard_end = (start + self.config.max_length).min(total);
        let end = if hard_end == total { total } else { self.boundary(start, hard_end) };

        let chunk = Chunk {
            text: self.slice(start, end).to_string(),
            source_identifier: self.source_identifier.to_string(),
            sequence_index: self.next_index,
            char_span: CharSpan::new(start, end),
            page: self.page_boundaries.and_then(|b| page_for_offset(b, start)),
        };

        self.next_index += 1;
        if end == total {
            self.done = true;
        } else {
            self.start = end - self.config.overlap;
        }
        Some(chunk)
    }
}

impl std::iter::FusedIterator for Chunks<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_prefers_paragraph_over_sentence() {
        let text = "aaaa. bbbb\n\ncccc. dddd";
        let c = Chunks::new(text, "t", None, ChunkingConfig { max_length: 20, overlap: 2 });
        assert_eq!(c.boundary(0, 20), 12);
    }

    #[test]
    fn boundary_ignores_separator_inside_overlap() {
        let text = "a. bbbbbbbbbbbbbbbbbbbb";
        let c = Chunks::new(text, "t", None, ChunkingConfig { max_length: 10, overlap: 4 });
        assert_eq!(c.boundary(0, 10), 10);
    }
}
