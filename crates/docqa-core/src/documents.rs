//! Loads already-extracted text files from a directory as [`Document`]s.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::Document;

/// Page separator left behind by text extraction from paged formats.
pub const FORM_FEED: char = '\x0c';

const TEXT_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// One document per text file under `dir`, sorted by path.
///
/// The path relative to `dir` becomes the source identifier, so re-ingesting
/// an updated file supersedes its previous version.
pub fn load_documents(dir: &Path) -> Result<Vec<Document>> {
    let files = list_text_files(dir);
    if files.is_empty() {
        tracing::info!(dir = %dir.display(), "no text files found");
        return Ok(vec![]);
    }
    let mut docs = Vec::with_capacity(files.len());
    for path in &files {
        docs.push(load_document(path, dir)?);
    }
    tracing::info!(dir = %dir.display(), documents = docs.len(), "loaded documents");
    Ok(docs)
}

pub fn load_document(path: &Path, base: &Path) -> Result<Document> {
    let text = read_file_content(path)?;
    let source = source_identifier(path, base);
    Ok(document_from_text(source, text))
}

/// Builds a document, deriving page boundaries from form feeds when present.
pub fn document_from_text(source_identifier: impl Into<String>, text: String) -> Document {
    let boundaries = page_boundaries(&text);
    let doc = Document::new(source_identifier, text);
    match boundaries {
        Some(b) => doc.with_page_boundaries(b),
        None => doc,
    }
}

/// Char offsets at which pages start; `None` when the text has no form feeds.
pub fn page_boundaries(text: &str) -> Option<Vec<usize>> {
    if !text.contains(FORM_FEED) { return None; }
    let mut bounds = vec![0];
    for (i, c) in text.chars().enumerate() {
        if c == FORM_FEED { bounds.push(i + 1); }
    }
    Some(bounds)
}

fn read_file_content(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(path)?).to_string()),
    }
}

fn source_identifier(path: &Path, base: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn list_text_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext))
        })
        .collect();
    files.sort();
    files
}
