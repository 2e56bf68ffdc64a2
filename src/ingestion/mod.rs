//! Ingestion pipeline module.
//!
//! Loads passages from a [`PassageProvider`] into a [`VectorStore`]:
//!
//! ```ignore
//! use axlerate::embedding::hashing::HashingEmbedding;
//! use axlerate::ingestion::IngestionPipeline;
//! use axlerate::provider::{DelimitedTextProvider, DEFAULT_DELIMITER, DEFAULT_SOURCE};
//! use axlerate::query::VectorStore;
//!
//! let store = VectorStore::open("./axlerate_db", "ladr_collection", HashingEmbedding::default()).await?;
//! let mut pipeline = IngestionPipeline::new(store, None);
//!
//! let metadata = DelimitedTextProvider::source_metadata(DEFAULT_SOURCE);
//! let provider = DelimitedTextProvider::from_file("ladr.txt", DEFAULT_DELIMITER, metadata).await?;
//! let stats = pipeline.ingest_from_provider(&provider).await?;
//! println!("Inserted: {}, failed: {}", stats.inserted, stats.failed);
//! ```
//!
//! Passages are embedded one batch at a time. A batch whose embedding call
//! fails is counted as failed and the run continues with the next batch; an
//! insert failure only affects its own passage. Duplicate passages are stored
//! again.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::embedding::EmbeddingProvider;
use crate::models::Passage;
use crate::provider::{PassageProvider, ProviderError};
use crate::query::VectorStore;
use crate::storage::PassageStorage;

/// Passages embedded per provider call unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Errors that abort an ingestion run.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Provider operation failed
    #[error("Provider error: {0}")]
    ProviderError(#[from] ProviderError),
}

/// Result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Statistics from an ingestion run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestionStats {
    /// Total number of input passages processed
    pub total_processed: usize,

    /// Number of passages successfully inserted
    pub inserted: usize,

    /// Number of passages that failed to embed or insert
    pub failed: usize,
}

impl IngestionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_inserted(&mut self) {
        self.total_processed += 1;
        self.inserted += 1;
    }

    pub fn record_failed(&mut self) {
        self.total_processed += 1;
        self.failed += 1;
    }
}

/// Ingestion pipeline coordinator.
pub struct IngestionPipeline<E, S>
where
    E: EmbeddingProvider,
    S: PassageStorage,
{
    store: VectorStore<E, S>,
    batch_size: usize,
}

impl<E, S> IngestionPipeline<E, S>
where
    E: EmbeddingProvider,
    S: PassageStorage,
{
    /// Wrap an initialized store.
    ///
    /// `batch_size` defaults to [`DEFAULT_BATCH_SIZE`] and is at least 1.
    pub fn new(store: VectorStore<E, S>, batch_size: Option<usize>) -> Self {
        Self {
            store,
            batch_size: batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn store(&self) -> &VectorStore<E, S> {
        &self.store
    }

    pub fn into_store(self) -> VectorStore<E, S> {
        self.store
    }

    /// Embed and insert `passages` in batches.
    pub async fn ingest_batch(&mut self, passages: &[Passage]) -> IngestionStats {
        self.ingest_batch_with_progress(passages, |_| {}).await
    }

    /// Like [`ingest_batch`](Self::ingest_batch), reporting running totals
    /// after every batch.
    pub async fn ingest_batch_with_progress<F>(
        &mut self,
        passages: &[Passage],
        mut on_batch: F,
    ) -> IngestionStats
    where
        F: FnMut(&IngestionStats) + Send,
    {
        let mut stats = IngestionStats::new();

        for (index, chunk) in passages.chunks(self.batch_size).enumerate() {
            match self.store.add_batch(chunk).await {
                Ok(results) => {
                    for (passage, result) in chunk.iter().zip(results) {
                        match result {
                            Ok(id) => {
                                debug!("Inserted passage {}", id);
                                stats.record_inserted();
                            }
                            Err(e) => {
                                warn!("Failed to insert passage {:?}: {}", preview(&passage.text), e);
                                stats.record_failed();
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        "Failed to embed batch {} ({} passages): {}",
                        index + 1,
                        chunk.len(),
                        e
                    );
                    for _ in chunk {
                        stats.record_failed();
                    }
                }
            }
            on_batch(&stats);
        }

        stats
    }

    /// Fetch every passage from `provider` and ingest it.
    ///
    /// # Errors
    /// Returns `IngestionError::ProviderError` if the provider cannot be read
    pub async fn ingest_from_provider<P>(&mut self, provider: &P) -> IngestionResult<IngestionStats>
    where
        P: PassageProvider,
    {
        let passages = provider.fetch_passages().await?;
        info!("Ingesting {} passages from {}", passages.len(), provider.name());

        let stats = self.ingest_batch(&passages).await;
        info!(
            "Ingestion finished: {} inserted, {} failed",
            stats.inserted, stats.failed
        );
        Ok(stats)
    }
}

fn preview(text: &str) -> String {
    text.chars().take(40).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::hashing::HashingEmbedding;
    use crate::embedding::{EmbeddingError, EmbeddingResult};
    use crate::models::{EmbeddingConfig, PassageMetadata};
    use crate::provider::{DelimitedTextProvider, ProviderResult};
    use crate::storage::sqlite::SqliteStorage;
    use crate::storage::{StorageError, StorageResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // Hashing embedder that refuses any batch containing "FAIL"
    struct FlakyEmbedding {
        inner: HashingEmbedding,
        batch_calls: Arc<AtomicUsize>,
    }

    impl FlakyEmbedding {
        fn new() -> Self {
            Self {
                inner: HashingEmbedding::new(16),
                batch_calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyEmbedding {
        async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
            self.inner.embed(text).await
        }

        async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            if texts.iter().any(|t| t.contains("FAIL")) {
                return Err(EmbeddingError::ApiError("Mock batch failure".to_string()));
            }
            self.inner.embed_batch(texts).await
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn model_name(&self) -> &str {
            self.inner.model_name()
        }
    }

    // In-memory storage that rejects passages containing "reject"
    #[derive(Default)]
    struct MockStorage {
        config: Option<EmbeddingConfig>,
        passages: Vec<Passage>,
    }

    #[async_trait]
    impl PassageStorage for MockStorage {
        async fn initialize(&mut self) -> StorageResult<()> {
            Ok(())
        }

        async fn store_config(&mut self, config: &EmbeddingConfig) -> StorageResult<()> {
            self.config = Some(config.clone());
            Ok(())
        }

        async fn get_config(&self) -> StorageResult<Option<EmbeddingConfig>> {
            Ok(self.config.clone())
        }

        async fn insert_passage(&mut self, passage: &Passage) -> StorageResult<i64> {
            if passage.text.contains("reject") {
                return Err(StorageError::QueryError("constraint failed".to_string()));
            }
            let mut stored = passage.clone();
            let id = self.passages.len() as i64 + 1;
            stored.id = Some(id);
            self.passages.push(stored);
            Ok(id)
        }

        async fn get_all_passages(&self) -> StorageResult<Vec<Passage>> {
            Ok(self.passages.clone())
        }

        async fn count_passages(&self) -> StorageResult<usize> {
            Ok(self.passages.len())
        }

        fn collection(&self) -> &str {
            "mock"
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl PassageProvider for FailingProvider {
        async fn fetch_passages(&self) -> ProviderResult<Vec<Passage>> {
            Err(ProviderError::ParseError("bad input".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn passages(texts: &[&str]) -> Vec<Passage> {
        texts
            .iter()
            .map(|t| Passage::new(*t, PassageMetadata::new()))
            .collect()
    }

    async fn mock_pipeline(batch_size: Option<usize>) -> IngestionPipeline<FlakyEmbedding, MockStorage> {
        let mut store = VectorStore::new(FlakyEmbedding::new(), MockStorage::default());
        store.initialize().await.unwrap();
        IngestionPipeline::new(store, batch_size)
    }

    #[tokio::test]
    async fn test_batch_size_defaults_and_clamps() {
        assert_eq!(mock_pipeline(None).await.batch_size(), DEFAULT_BATCH_SIZE);
        assert_eq!(mock_pipeline(Some(0)).await.batch_size(), 1);
    }

    #[tokio::test]
    async fn test_all_inserted() {
        let mut pipeline = mock_pipeline(None).await;
        let stats = pipeline.ingest_batch(&passages(&["a", "b", "c"])).await;

        assert_eq!(
            stats,
            IngestionStats {
                total_processed: 3,
                inserted: 3,
                failed: 0
            }
        );
        assert_eq!(pipeline.store().count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_one_embedding_call_per_batch() {
        let mut pipeline = mock_pipeline(Some(2)).await;
        let calls = pipeline.store().embedding_provider().batch_calls.clone();

        let mut seen = Vec::new();
        let stats = pipeline
            .ingest_batch_with_progress(&passages(&["a", "b", "c", "d", "e"]), |s| {
                seen.push(s.total_processed)
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(seen, vec![2, 4, 5]);
        assert_eq!(stats.inserted, 5);
    }

    #[tokio::test]
    async fn test_embedding_failure_fails_only_that_batch() {
        let mut pipeline = mock_pipeline(Some(2)).await;
        let stats = pipeline
            .ingest_batch(&passages(&["a", "FAIL", "c", "d"]))
            .await;

        assert_eq!(stats.total_processed, 4);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.inserted, 2);
    }

    #[tokio::test]
    async fn test_insert_failure_is_per_passage() {
        let mut pipeline = mock_pipeline(None).await;
        let stats = pipeline
            .ingest_batch(&passages(&["keep", "reject me", "keep too"]))
            .await;

        assert_eq!(stats.inserted, 2);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn test_duplicates_are_stored_again() {
        let mut pipeline = mock_pipeline(None).await;
        let stats = pipeline.ingest_batch(&passages(&["same", "same"])).await;

        assert_eq!(stats.inserted, 2);
        assert_eq!(pipeline.store().count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let mut pipeline = mock_pipeline(None).await;
        let stats = pipeline.ingest_batch(&[]).await;
        assert_eq!(stats, IngestionStats::new());
    }

    #[tokio::test]
    async fn test_ingest_from_text_provider_into_sqlite() {
        let storage = SqliteStorage::open_in_memory("ladr_collection").unwrap();
        let mut store = VectorStore::new(HashingEmbedding::new(64), storage);
        store.initialize().await.unwrap();
        let mut pipeline = IngestionPipeline::new(store, None);

        let metadata = DelimitedTextProvider::source_metadata("Linear Algebra Done Right");
        let provider = DelimitedTextProvider::from_content(
            "Definition 1.19 vector space\n---\nTheorem 1.34 subspace conditions\n---\n",
            "---",
            metadata,
        )
        .unwrap();

        let stats = pipeline.ingest_from_provider(&provider).await.unwrap();
        assert_eq!(stats.inserted, 2);

        let store = pipeline.into_store();
        let hits = store.search("Theorem 1.34 subspace conditions", 1).await.unwrap();
        assert_eq!(hits[0].passage.text, "Theorem 1.34 subspace conditions");
        assert_eq!(
            hits[0].passage.metadata.get("source").map(String::as_str),
            Some("Linear Algebra Done Right")
        );
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let mut pipeline = mock_pipeline(None).await;
        let result = pipeline.ingest_from_provider(&FailingProvider).await;
        assert!(matches!(result, Err(IngestionError::ProviderError(_))));
    }
}
