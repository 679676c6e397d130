//! On-disk layout of a vector store.
//!
//! A store directory holds `index.jsonl`. The first line is a [`Header`]; every
//! later line is one [`Record`]. Replaying the records in order rebuilds the
//! store. Every record carries a blake3 checksum of its payload so a torn or
//! edited line is detected instead of silently loaded.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docqa_core::{Error, IndexEntry, Result};

pub const INDEX_FILE: &str = "index.jsonl";
pub const FORMAT_NAME: &str = "docqa-index";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub format: String,
    pub version: u32,
    pub dim: usize,
    pub created_at: DateTime<Utc>,
}

impl Header {
    pub fn new(dim: usize) -> Self {
        Self { format: FORMAT_NAME.to_string(), version: FORMAT_VERSION, dim, created_at: Utc::now() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Record {
    Put { entry: IndexEntry, checksum: String },
    /// Drops entries of `source` whose sequence index is not in `keep`.
    Prune { source: String, keep: Vec<usize>, checksum: String },
}

impl Record {
    pub fn put(entry: IndexEntry) -> Result<Self> {
        let checksum = entry_checksum(&entry)?;
        Ok(Record::Put { entry, checksum })
    }

    pub fn prune(source: impl Into<String>, keep: Vec<usize>) -> Self {
        let source = source.into();
        let checksum = prune_checksum(&source, &keep);
        Record::Prune { source, keep, checksum }
    }
}

fn entry_checksum(entry: &IndexEntry) -> Result<String> {
    let bytes = serde_json::to_vec(entry).map_err(|e| Error::Persistence(e.to_string()))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

fn prune_checksum(source: &str, keep: &[usize]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(source.as_bytes());
    hasher.update(&[0]);
    for seq in keep {
        hasher.update(&(*seq as u64).to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

pub fn index_file(dir: &Path) -> PathBuf { dir.join(INDEX_FILE) }

/// Writes a complete index file atomically: temp file in `dir`, fsync, rename.
///
/// On failure the previous `index.jsonl` is left untouched.
pub fn write_snapshot<'a>(dir: &Path, dim: usize, entries: impl Iterator<Item = &'a IndexEntry>) -> Result<usize> {
    let persist_err = |e: std::io::Error| Error::Persistence(format!("{}: {e}", dir.display()));
    fs::create_dir_all(dir).map_err(persist_err)?;
    let tmp = tempfile::NamedTempFile::new_in(dir).map_err(persist_err)?;
    let mut written = 0usize;
    {
        let mut w = BufWriter::new(tmp.as_file());
        write_line(&mut w, &Header::new(dim))?;
        for entry in entries {
            write_line(&mut w, &Record::put(entry.clone())?)?;
            written += 1;
        }
        w.flush().map_err(persist_err)?;
    }
    tmp.as_file().sync_all().map_err(persist_err)?;
    tmp.persist(index_file(dir)).map_err(|e| persist_err(e.error))?;
    Ok(written)
}

/// Appends journal records to an existing index file.
///
/// A failed append truncates the file back to its previous length, so no
/// torn record is left behind.
pub fn append_records(dir: &Path, records: &[Record]) -> Result<()> {
    let path = index_file(dir);
    let persist_err = |e: std::io::Error| Error::Persistence(format!("{}: {e}", path.display()));
    let file = OpenOptions::new().append(true).open(&path).map_err(persist_err)?;
    append_or_rollback(&file, &path, |file| {
        let mut w = BufWriter::new(file);
        for record in records {
            write_line(&mut w, record)?;
        }
        w.flush().map_err(persist_err)?;
        drop(w);
        file.sync_data().map_err(persist_err)
    })
}

fn append_or_rollback<F>(file: &File, path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&File) -> Result<()>,
{
    let original_len = file
        .metadata()
        .map_err(|e| Error::Persistence(format!("{}: {e}", path.display())))?
        .len();
    let result = write(file);
    if result.is_err() {
        if let Err(e) = file.set_len(original_len).and_then(|()| file.sync_data()) {
            tracing::warn!(path = %path.display(), error = %e, "could not roll back partial append");
        }
    }
    result
}

fn write_line<W: Write, T: Serialize>(w: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *w, value).map_err(|e| Error::Persistence(e.to_string()))?;
    w.write_all(b"\n").map_err(|e| Error::Persistence(e.to_string()))
}

/// Result of reading an index file: the header, every valid record and the
/// 1-based line numbers of records that could not be read.
#[derive(Debug)]
pub struct ParsedIndex {
    pub header: Header,
    pub records: Vec<Record>,
    pub corrupt_lines: Vec<usize>,
}

pub fn read_index(dir: &Path) -> Result<ParsedIndex> {
    let path = index_file(dir);
    let file = File::open(&path)?;
    let mut lines = BufReader::new(file).lines();

    let header_line = match lines.next() {
        Some(line) => line.map_err(|e| Error::CorruptIndex(format!("{}: {e}", path.display())))?,
        None => return Err(Error::CorruptIndex(format!("{}: empty index file", path.display()))),
    };
    let header: Header = serde_json::from_str(&header_line)
        .map_err(|e| Error::CorruptIndex(format!("{}: unreadable header: {e}", path.display())))?;
    if header.format != FORMAT_NAME || header.version != FORMAT_VERSION {
        return Err(Error::CorruptIndex(format!(
            "{}: unsupported format {} v{}",
            path.display(),
            header.format,
            header.version
        )));
    }

    let mut records = Vec::new();
    let mut corrupt_lines = Vec::new();
    for (i, line) in lines.enumerate() {
        let line_no = i + 2;
        let line = match line {
            Ok(l) => l,
            Err(_) => { corrupt_lines.push(line_no); continue; }
        };
        if line.trim().is_empty() { continue; }
        match parse_record(&line, header.dim) {
            Some(record) => records.push(record),
            None => corrupt_lines.push(line_no),
        }
    }
    Ok(ParsedIndex { header, records, corrupt_lines })
}

fn parse_record(line: &str, dim: usize) -> Option<Record> {
    let record: Record = serde_json::from_str(line).ok()?;
    match &record {
        Record::Put { entry, checksum } => {
            if entry.vector.len() != dim { return None; }
            if entry_checksum(entry).ok()? != *checksum { return None; }
        }
        Record::Prune { source, keep, checksum } => {
            if prune_checksum(source, keep) != *checksum { return None; }
        }
    }
    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::{CharSpan, Chunk};

    fn entry() -> IndexEntry {
        IndexEntry {
            vector: vec![0.25, -1.5, 3.0],
            chunk: Chunk {
                text: "x".into(),
                source_identifier: "s".into(),
                sequence_index: 0,
                char_span: CharSpan::new(0, 1),
                page: None,
            },
        }
    }

    #[test]
    fn put_record_checksum_survives_json() {
        let record = Record::put(entry()).unwrap();
        let line = serde_json::to_string(&record).unwrap();
        assert!(line.starts_with("{\"op\":\"put\""));
        assert_eq!(parse_record(&line, 3), Some(record));
        assert_eq!(parse_record(&line, 4), None);
    }

    #[test]
    fn failed_append_leaves_no_partial_line() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join(INDEX_FILE);
        fs::write(&path, "{\"header\":1}\n").unwrap();
        let file = OpenOptions::new().append(true).open(&path).unwrap();

        let result = append_or_rollback(&file, &path, |mut f| {
            f.write_all(b"{\"op\":\"put\",\"ent").unwrap();
            Err(Error::Persistence("disk full".into()))
        });
        assert!(matches!(result, Err(Error::Persistence(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"header\":1}\n");

        append_or_rollback(&file, &path, |mut f| {
            f.write_all(b"{\"op\":\"prune\"}\n").map_err(Error::from)
        })
        .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"header\":1}\n{\"op\":\"prune\"}\n");
    }

    #[test]
    fn tampered_prune_is_rejected() {
        let line = serde_json::to_string(&Record::prune("a.txt", vec![0, 1, 2])).unwrap();
        assert!(parse_record(&line, 3).is_some());
        assert_eq!(parse_record(&line.replace("[0,1,2]", "[0]"), 3), None);
        assert_eq!(parse_record(&line.replace("a.txt", "b.txt"), 3), None);
        let unchecked = r#"{"op":"prune","source":"a.txt","keep":[]}"#;
        assert_eq!(parse_record(unchecked, 3), None);
    }

    #[test]
    fn tampered_entry_is_rejected() {
        let line = serde_json::to_string(&Record::put(entry()).unwrap()).unwrap();
        let tampered = line.replace("0.25", "0.5");
        assert_eq!(parse_record(&tampered, 3), None);
    }
}
