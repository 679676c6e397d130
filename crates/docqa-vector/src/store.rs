use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use docqa_core::{Error, IndexEntry, QueryResult, Result};

use crate::persist::{self, Record};
use crate::similarity::{cosine_with_norm, norm};

/// Outcome of a best-effort load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Entries present in the store after replay.
    pub loaded: usize,
    /// 1-based line numbers of records that were skipped.
    pub corrupt_lines: Vec<usize>,
}

/// Searchable state. Never mutated once published; writers build a new one.
#[derive(Debug, Clone, Default)]
struct StoreState {
    entries: Vec<Arc<IndexEntry>>,
    slots: HashMap<(String, usize), usize>,
}

impl StoreState {
    /// Replaces in place when the chunk key exists, appends otherwise.
    fn put(&mut self, entry: IndexEntry) {
        let key = (entry.chunk.source_identifier.clone(), entry.chunk.sequence_index);
        match self.slots.get(&key) {
            Some(&slot) => self.entries[slot] = Arc::new(entry),
            None => {
                self.slots.insert(key, self.entries.len());
                self.entries.push(Arc::new(entry));
            }
        }
    }

    fn prune(&mut self, source: &str, keep: &HashSet<usize>) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|e| e.chunk.source_identifier != source || keep.contains(&e.chunk.sequence_index));
        let removed = before - self.entries.len();
        if removed > 0 { self.reindex_slots(); }
        removed
    }

    fn reindex_slots(&mut self) {
        self.slots = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| ((e.chunk.source_identifier.clone(), e.chunk.sequence_index), i))
            .collect();
    }

    fn apply(&mut self, record: Record) {
        match record {
            Record::Put { entry, .. } => self.put(entry),
            Record::Prune { source, keep, .. } => {
                let keep: HashSet<usize> = keep.into_iter().collect();
                self.prune(&source, &keep);
            }
        }
    }
}

#[derive(Debug, Default)]
struct Journal {
    records: Vec<Record>,
    // Set when the file on disk may no longer match a replay of the journal.
    needs_rewrite: bool,
}

/// Exhaustive cosine-similarity index over `(vector, chunk)` entries.
///
/// Writers are serialised and publish a fresh snapshot with a single pointer
/// swap, so searches see either the state before or after a write and only
/// wait for the swap itself. Disk writes work from a cloned snapshot and never
/// hold the search lock.
#[derive(Debug)]
pub struct VectorStore {
    dim: usize,
    path: Option<PathBuf>,
    state: RwLock<Arc<StoreState>>,
    writer: Mutex<()>,
    journal: Mutex<Journal>,
    disk: Mutex<()>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl VectorStore {
    pub fn new(dim: usize) -> Self {
        Self::with_state(dim, None, StoreState::default())
    }

    /// In-memory store that persists to `dir`.
    pub fn with_path(dim: usize, dir: impl Into<PathBuf>) -> Self {
        Self::with_state(dim, Some(dir.into()), StoreState::default())
    }

    fn with_state(dim: usize, path: Option<PathBuf>, state: StoreState) -> Self {
        Self {
            dim,
            path,
            state: RwLock::new(Arc::new(state)),
            writer: Mutex::new(()),
            journal: Mutex::new(Journal::default()),
            disk: Mutex::new(()),
        }
    }

    pub fn dim(&self) -> usize { self.dim }

    pub fn path(&self) -> Option<&Path> { self.path.as_deref() }

    pub fn len(&self) -> usize { self.snapshot().entries.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Distinct source identifiers in insertion order.
    pub fn sources(&self) -> Vec<String> {
        let snapshot = self.snapshot();
        let mut seen = HashSet::new();
        snapshot
            .entries
            .iter()
            .filter(|e| seen.insert(e.chunk.source_identifier.as_str()))
            .map(|e| e.chunk.source_identifier.clone())
            .collect()
    }

    fn snapshot(&self) -> Arc<StoreState> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn publish(&self, state: StoreState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(state);
    }

    fn check_dims(&self, entries: &[IndexEntry]) -> Result<()> {
        match entries.iter().find(|e| e.vector.len() != self.dim) {
            Some(bad) => Err(Error::DimensionMismatch { expected: self.dim, actual: bad.vector.len() }),
            None => Ok(()),
        }
    }

    /// Inserts entries, replacing any with the same `(source_identifier, sequence_index)`.
    ///
    /// All vectors are validated before anything is applied.
    pub fn upsert(&self, entries: Vec<IndexEntry>) -> Result<()> {
        self.check_dims(&entries)?;
        if entries.is_empty() { return Ok(()); }
        let records = entries.iter().cloned().map(Record::put).collect::<Result<Vec<_>>>()?;

        let _writer = lock(&self.writer);
        let mut next = (*self.snapshot()).clone();
        for entry in entries {
            next.put(entry);
        }
        self.publish(next);
        lock(&self.journal).records.extend(records);
        Ok(())
    }

    /// Swaps in a new version of one document in a single step.
    ///
    /// Entries of `source` whose sequence index is not among `entries` are
    /// dropped, so a shorter re-ingested document leaves no stale tail.
    pub fn replace_source(&self, source: &str, entries: Vec<IndexEntry>) -> Result<usize> {
        self.check_dims(&entries)?;
        if let Some(stray) = entries.iter().find(|e| e.chunk.source_identifier != source) {
            return Err(Error::InvalidConfig(format!(
                "entry for '{}' passed to replace_source('{}')",
                stray.chunk.source_identifier, source
            )));
        }
        let keep: Vec<usize> = entries.iter().map(|e| e.chunk.sequence_index).collect();
        let mut records = entries.iter().cloned().map(Record::put).collect::<Result<Vec<_>>>()?;
        records.push(Record::prune(source, keep.clone()));

        let _writer = lock(&self.writer);
        let mut next = (*self.snapshot()).clone();
        for entry in entries {
            next.put(entry);
        }
        let removed = next.prune(source, &keep.into_iter().collect());
        self.publish(next);
        lock(&self.journal).records.extend(records);
        Ok(removed)
    }

    /// Removes every entry of `source`, returning how many were dropped.
    pub fn remove_source(&self, source: &str) -> usize {
        let _writer = lock(&self.writer);
        let mut next = (*self.snapshot()).clone();
        let removed = next.prune(source, &HashSet::new());
        if removed > 0 {
            self.publish(next);
            lock(&self.journal).records.push(Record::prune(source, Vec::new()));
        }
        removed
    }

    /// At most `top_k` entries scoring at least `score_threshold`, best first.
    ///
    /// Equal scores keep insertion order. An empty store yields no results for
    /// any query.
    pub fn search(&self, query: &[f32], top_k: usize, score_threshold: f32) -> Result<Vec<QueryResult>> {
        let snapshot = self.snapshot();
        if snapshot.entries.is_empty() { return Ok(Vec::new()); }
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: query.len() });
        }
        if top_k == 0 { return Ok(Vec::new()); }

        let query_norm = norm(query);
        let mut scored: Vec<(f32, usize)> = snapshot
            .entries
            .iter()
            .enumerate()
            .map(|(slot, e)| (cosine_with_norm(query, query_norm, &e.vector), slot))
            .filter(|(score, _)| *score >= score_threshold)
            .collect();
        // Stable sort: ties stay in slot order.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(score, slot)| QueryResult { chunk: snapshot.entries[slot].chunk.clone(), score })
            .collect())
    }

    fn bound_path(&self) -> Result<&Path> {
        self.path
            .as_deref()
            .ok_or_else(|| Error::Persistence("store is not bound to a path".into()))
    }

    /// Writes a compacted snapshot of the whole store to its directory.
    pub fn persist(&self) -> Result<()> {
        let dir = self.bound_path()?;
        let _disk = lock(&self.disk);
        let (snapshot, drained) = {
            let _writer = lock(&self.writer);
            let drained = std::mem::take(&mut lock(&self.journal).records);
            (self.snapshot(), drained)
        };
        match persist::write_snapshot(dir, self.dim, snapshot.entries.iter().map(Arc::as_ref)) {
            Ok(written) => {
                lock(&self.journal).needs_rewrite = false;
                tracing::info!(path = %dir.display(), entries = written, "persisted vector store");
                Ok(())
            }
            Err(e) => {
                self.restore_journal(drained);
                Err(e)
            }
        }
    }

    /// Appends changes made since the last persist/flush to the index file.
    ///
    /// Falls back to a full [`persist`](Self::persist) when there is no file
    /// yet or an earlier write left the file out of step. A failed append is
    /// truncated away, so the file stays loadable.
    pub fn flush(&self) -> Result<()> {
        let dir = self.bound_path()?;
        let needs_rewrite = lock(&self.journal).needs_rewrite;
        if needs_rewrite || !persist::index_file(dir).exists() {
            return self.persist();
        }
        let _disk = lock(&self.disk);
        let drained = std::mem::take(&mut lock(&self.journal).records);
        if drained.is_empty() { return Ok(()); }
        match persist::append_records(dir, &drained) {
            Ok(()) => {
                tracing::debug!(path = %dir.display(), records = drained.len(), "appended journal records");
                Ok(())
            }
            Err(e) => {
                self.restore_journal(drained);
                Err(e)
            }
        }
    }

    fn restore_journal(&self, mut drained: Vec<Record>) {
        let mut journal = lock(&self.journal);
        drained.append(&mut journal.records);
        journal.records = drained;
        journal.needs_rewrite = true;
    }

    /// Strict load: any unreadable record fails with `CorruptIndex`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let parsed = persist::read_index(dir)?;
        if let Some(first) = parsed.corrupt_lines.first() {
            return Err(Error::CorruptIndex(format!(
                "{}: {} corrupt record(s), first at line {}",
                persist::index_file(dir).display(),
                parsed.corrupt_lines.len(),
                first
            )));
        }
        let mut state = StoreState::default();
        for record in parsed.records {
            state.apply(record);
        }
        tracing::info!(path = %dir.display(), entries = state.entries.len(), "loaded vector store");
        Ok(Self::with_state(parsed.header.dim, Some(dir.to_path_buf()), state))
    }

    /// Best-effort load: replays every readable record and reports the rest.
    ///
    /// An unreadable header is still `CorruptIndex`; only individual records
    /// are skipped. The next flush rewrites the file without them.
    pub fn load_with_recovery(dir: impl AsRef<Path>) -> Result<(Self, LoadReport)> {
        let dir = dir.as_ref();
        let parsed = persist::read_index(dir)?;
        for line in &parsed.corrupt_lines {
            tracing::warn!(path = %dir.display(), line = *line, "skipping corrupt index record");
        }
        let mut state = StoreState::default();
        for record in parsed.records {
            state.apply(record);
        }
        let report = LoadReport { loaded: state.entries.len(), corrupt_lines: parsed.corrupt_lines };
        let store = Self::with_state(parsed.header.dim, Some(dir.to_path_buf()), state);
        if !report.corrupt_lines.is_empty() {
            lock(&store.journal).needs_rewrite = true;
        }
        Ok((store, report))
    }

    /// Loads `dir` if it holds an index, otherwise starts an empty store bound to it.
    pub fn open_or_create(dir: impl AsRef<Path>, dim: usize) -> Result<Self> {
        let dir = dir.as_ref();
        if !persist::index_file(dir).exists() {
            tracing::info!(path = %dir.display(), dim, "creating new vector store");
            return Ok(Self::with_path(dim, dir));
        }
        let store = Self::load(dir)?;
        if store.dim != dim {
            return Err(Error::DimensionMismatch { expected: dim, actual: store.dim });
        }
        Ok(store)
    }
}
