use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::{StreamExt, TryStreamExt};
use tokio::sync::{Semaphore, SemaphorePermit};

use docqa_core::config::Settings;
use docqa_core::documents::document_from_text;
use docqa_core::{
    Chunk, Chunker, ChunkingConfig, Document, Embedder, Error, Generator, IndexEntry, IngestReport, QueryAnswer,
    QueryResult, Result, RetrievalContext, SourceRef,
};
use docqa_vector::VectorStore;

use crate::prompt::build_prompt;
use crate::retry::{retry, with_timeout, RetryPolicy};

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub chunking: ChunkingConfig,
    /// Upper bound for a single embedding or generation call.
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    /// Size of each admission pool (queries, ingests), and concurrent
    /// embedding calls per ingest.
    pub workers: usize,
    /// Append index changes to disk after every ingest when the store has a path.
    pub persist_on_ingest: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            workers: 4,
            persist_on_ingest: true,
        }
    }
}

impl PipelineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        let rt = &settings.runtime;
        Self {
            chunking: settings.chunking,
            request_timeout: Duration::from_millis(rt.request_timeout_ms),
            retry: RetryPolicy {
                max_retries: rt.max_retries,
                initial_backoff: Duration::from_millis(rt.backoff_ms),
                ..RetryPolicy::default()
            },
            workers: rt.workers,
            persist_on_ingest: true,
        }
    }
}

/// Ingestion and retrieval over one vector store.
///
/// The embedder and generator are injected so tests can substitute
/// deterministic fakes. Every collaborator call is timeout-bound and retried
/// with backoff according to the pipeline's [`RetryPolicy`].
///
/// Queries and ingests are admitted through separate pools, so a long
/// ingest never holds capacity a query needs.
pub struct RagPipeline {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    chunker: Chunker,
    options: PipelineOptions,
    query_permits: Semaphore,
    ingest_permits: Semaphore,
    source_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RagPipeline {
    pub fn new(
        store: Arc<VectorStore>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        options: PipelineOptions,
    ) -> Result<Self> {
        let chunker = Chunker::new(options.chunking)?;
        if options.workers == 0 {
            return Err(Error::InvalidConfig("workers must be positive".into()));
        }
        if embedder.dim() != store.dim() {
            return Err(Error::DimensionMismatch { expected: store.dim(), actual: embedder.dim() });
        }
        Ok(Self {
            query_permits: Semaphore::new(options.workers),
            ingest_permits: Semaphore::new(options.workers),
            store,
            embedder,
            generator,
            chunker,
            options,
            source_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn store(&self) -> &Arc<VectorStore> { &self.store }

    pub fn options(&self) -> &PipelineOptions { &self.options }

    async fn admit(pool: &Semaphore) -> Result<SemaphorePermit<'_>> {
        pool.acquire()
            .await
            .map_err(|_| Error::InvalidConfig("worker pool is closed".into()))
    }

    fn source_lock(&self, source: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.source_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(source.to_string()).or_default())
    }

    /// Drops the lock entry for `source` once no other ingest holds or awaits it.
    fn release_source_lock(&self, source: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        drop(lock);
        let mut locks = self.source_locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(source).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(source);
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let timeout = self.options.request_timeout;
        let vector = retry(&self.options.retry, "embed", || with_timeout(timeout, self.embedder.embed(text))).await?;
        if vector.len() != self.store.dim() {
            return Err(Error::DimensionMismatch { expected: self.store.dim(), actual: vector.len() });
        }
        Ok(vector)
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let timeout = self.options.request_timeout;
        retry(&self.options.retry, "generate", || with_timeout(timeout, self.generator.generate(prompt))).await
    }

    /// Embeds chunks with at most `workers` calls in flight, preserving order.
    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<IndexEntry>> {
        futures::stream::iter(chunks)
            .map(|chunk| async move {
                let vector = self.embed(&chunk.text).await?;
                tracing::debug!(source = %chunk.source_identifier, seq = chunk.sequence_index, "embedded chunk");
                Ok::<_, Error>(IndexEntry { vector, chunk })
            })
            .buffered(self.options.workers)
            .try_collect()
            .await
    }

    pub async fn ingest(&self, source_identifier: &str, raw_text: &str) -> Result<IngestReport> {
        self.ingest_document(document_from_text(source_identifier, raw_text.to_string())).await
    }

    /// Chunks, embeds and indexes one document, superseding any earlier version.
    ///
    /// Ingests of the same source are serialised; the last one to finish wins.
    /// Searches keep running against the previous version until the new one
    /// is swapped in whole.
    pub async fn ingest_document(&self, doc: Document) -> Result<IngestReport> {
        let lock = self.source_lock(&doc.source_identifier);
        let result = {
            let _guard = lock.lock().await;
            self.ingest_locked(&doc).await
        };
        self.release_source_lock(&doc.source_identifier, lock);
        result
    }

    async fn ingest_locked(&self, doc: &Document) -> Result<IngestReport> {
        // Waiting on the source lock holds no permit.
        let _permit = Self::admit(&self.ingest_permits).await?;
        let chunks: Vec<Chunk> = self.chunker.chunks(doc).collect();
        let entries = self.embed_chunks(chunks).await?;
        let chunks_len = entries.len();
        let removed = self.store.replace_source(&doc.source_identifier, entries)?;

        if self.options.persist_on_ingest && self.store.path().is_some() {
            let store = Arc::clone(&self.store);
            tokio::task::spawn_blocking(move || store.flush())
                .await
                .map_err(|e| Error::Persistence(e.to_string()))??;
        }

        tracing::info!(source = %doc.source_identifier, chunks = chunks_len, stale_removed = removed, "ingested document");
        Ok(IngestReport { documents_len: 1, chunks_len })
    }

    /// Ingests documents concurrently; stops at the first failure.
    pub async fn ingest_many(&self, docs: Vec<Document>) -> Result<IngestReport> {
        futures::stream::iter(docs)
            .map(|doc| self.ingest_document(doc))
            .buffer_unordered(self.options.workers)
            .try_fold(IngestReport::default(), |mut total, report| async move {
                total += report;
                Ok::<_, Error>(total)
            })
            .await
    }

    /// Embeds `query`, searches the store and drops overlapping duplicates.
    pub async fn retrieve(&self, query: &str, top_k: usize, score_threshold: f32) -> Result<RetrievalContext> {
        let _permit = Self::admit(&self.query_permits).await?;
        self.retrieve_unadmitted(query, top_k, score_threshold).await
    }

    async fn retrieve_unadmitted(&self, query: &str, top_k: usize, score_threshold: f32) -> Result<RetrievalContext> {
        let vector = self.embed(query).await?;
        let hits = self.store.search(&vector, top_k, score_threshold)?;
        let hits_len = hits.len();
        let context = dedupe_overlapping(hits);
        tracing::debug!(hits = hits_len, kept = context.len(), top_k, score_threshold, "retrieved context");
        Ok(context)
    }

    /// Retrieves context for `text` and asks the generator to answer from it.
    pub async fn query(&self, text: &str, top_k: usize, score_threshold: f32) -> Result<QueryAnswer> {
        let _permit = Self::admit(&self.query_permits).await?;
        let context = self.retrieve_unadmitted(text, top_k, score_threshold).await?;
        let prompt = build_prompt(text, &context);
        let answer = self.generate(&prompt).await?;
        tracing::info!(sources = context.len(), "answered query");
        Ok(QueryAnswer { answer, sources: context.iter().map(SourceRef::from).collect() })
    }

    /// Plain generation without retrieval.
    pub async fn ask(&self, text: &str) -> Result<String> {
        let _permit = Self::admit(&self.query_permits).await?;
        self.generate(text).await
    }
}

/// Keeps, per source, only results whose spans do not overlap a better one.
///
/// Expects `results` best first and preserves that order.
pub fn dedupe_overlapping(results: Vec<QueryResult>) -> RetrievalContext {
    let mut kept: Vec<QueryResult> = Vec::with_capacity(results.len());
    for result in results {
        let duplicate = kept.iter().any(|k| {
            k.chunk.source_identifier == result.chunk.source_identifier
                && (k.chunk.sequence_index == result.chunk.sequence_index
                    || k.chunk.char_span.overlaps(&result.chunk.char_span))
        });
        if !duplicate { kept.push(result); }
    }
    RetrievalContext { results: kept }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docqa_embed::HashEmbedder;

    struct Echo;

    #[async_trait]
    impl Generator for Echo {
        fn model_id(&self) -> &str { "echo" }

        async fn generate(&self, prompt: &str) -> Result<String> { Ok(prompt.to_string()) }
    }

    fn locks_len(pipeline: &RagPipeline) -> usize {
        pipeline.source_locks.lock().unwrap().len()
    }

    #[tokio::test]
    async fn source_locks_are_dropped_after_ingest() {
        let options = PipelineOptions { persist_on_ingest: false, ..PipelineOptions::default() };
        let pipeline = Arc::new(
            RagPipeline::new(Arc::new(VectorStore::new(32)), Arc::new(HashEmbedder::new(32)), Arc::new(Echo), options)
                .unwrap(),
        );
        for i in 0..10 {
            pipeline.ingest(&format!("doc-{i}.txt"), "some text to index").await.unwrap();
        }
        assert_eq!(locks_len(&pipeline), 0);

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let pipeline = Arc::clone(&pipeline);
                tokio::spawn(async move { pipeline.ingest("shared.txt", &format!("version {i}")).await })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(locks_len(&pipeline), 0);
        assert_eq!(pipeline.store().sources().len(), 11);
    }
}
