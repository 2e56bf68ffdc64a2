//! Vector store: embedding-backed passage storage and nearest-neighbour search.
//!
//! [`VectorStore`] pairs an [`EmbeddingProvider`] with a [`PassageStorage`]
//! backend. Writes embed the passage text and append it to the collection;
//! searches embed the query, score every stored passage by cosine similarity
//! and return the closest `k`.
//!
//! # Usage
//!
//! ```rust,no_run
//! use axlerate::embedding::hashing::HashingEmbedding;
//! use axlerate::models::PassageMetadata;
//! use axlerate::query::VectorStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = VectorStore::open("./axlerate_db", "ladr_collection", HashingEmbedding::default()).await?;
//!
//! store.add("Theorem 1.34: ...", PassageMetadata::new()).await?;
//! for hit in store.search("What is a subspace?", 3).await? {
//!     println!("{:.3} {}", hit.score, hit.passage.text);
//! }
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::models::{EmbeddingConfig, Passage, PassageMetadata, ScoredPassage};
use crate::storage::sqlite::SqliteStorage;
use crate::storage::{PassageStorage, StorageError};

/// Errors that can occur while reading from or writing to the vector store.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    EmbeddingError(#[from] EmbeddingError),

    /// Storage access failed
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    /// The collection was built with a different embedding model
    #[error("Embedding config mismatch: {0}")]
    ConfigMismatch(String),

    /// A stored vector and the query vector have different lengths
    #[error("Dimension mismatch: query has {query} dimensions, passage {passage_id} has {stored}")]
    DimensionMismatch {
        query: usize,
        stored: usize,
        passage_id: i64,
    },
}

/// Result type for vector store operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Read-side capability used by the proof workflow.
///
/// Returns passage texts ranked closest-first, at most `k` of them.
#[async_trait]
pub trait PassageRetriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> QueryResult<Vec<String>>;
}

/// Compute cosine similarity between two vectors.
///
/// Returns `0.0` when either vector has zero magnitude. Callers must pass
/// vectors of equal length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vectors must have the same length");

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Brute-force vector store over a single collection.
///
/// Suitable for knowledge bases of a few thousand passages: every search
/// scans the whole collection.
pub struct VectorStore<E, S>
where
    E: EmbeddingProvider,
    S: PassageStorage,
{
    /// Embedding provider for passages and queries
    embedding_provider: E,

    /// Storage backend for the collection
    storage: S,
}

impl<E> VectorStore<E, SqliteStorage>
where
    E: EmbeddingProvider,
{
    /// Open or create the persistent collection under `persist_dir`.
    ///
    /// Calling this repeatedly against the same directory reuses the existing
    /// data.
    pub async fn open(
        persist_dir: impl AsRef<Path>,
        collection: &str,
        embedding_provider: E,
    ) -> QueryResult<Self> {
        let storage = SqliteStorage::open(persist_dir, collection)?;
        let mut store = Self::new(embedding_provider, storage);
        store.initialize().await?;
        Ok(store)
    }
}

impl<E, S> VectorStore<E, S>
where
    E: EmbeddingProvider,
    S: PassageStorage,
{
    /// Wrap an embedding provider and a storage backend.
    ///
    /// Call [`initialize`](Self::initialize) before use unless the storage is
    /// already initialized.
    pub fn new(embedding_provider: E, storage: S) -> Self {
        Self {
            embedding_provider,
            storage,
        }
    }

    /// Create the schema if needed and check the embedding configuration.
    ///
    /// A fresh collection records the provider's model name and dimension. An
    /// existing collection must match them, otherwise stored vectors and query
    /// vectors would not be comparable.
    ///
    /// # Errors
    /// Returns `QueryError::ConfigMismatch` if the collection was built with a
    /// different model
    pub async fn initialize(&mut self) -> QueryResult<()> {
        self.storage.initialize().await?;

        let provider_config = EmbeddingConfig {
            model_name: self.embedding_provider.model_name().to_string(),
            dimension: self.embedding_provider.dimension(),
        };

        match self.storage.get_config().await? {
            None => {
                self.storage.store_config(&provider_config).await?;
                debug!(
                    "Recorded embedding config for collection '{}': {} ({} dims)",
                    self.storage.collection(),
                    provider_config.model_name,
                    provider_config.dimension
                );
            }
            Some(stored) if stored.model_name != provider_config.model_name => {
                return Err(QueryError::ConfigMismatch(format!(
                    "provider uses '{}' but collection '{}' was built with '{}'",
                    provider_config.model_name,
                    self.storage.collection(),
                    stored.model_name
                )));
            }
            Some(stored) if stored.dimension != provider_config.dimension => {
                return Err(QueryError::ConfigMismatch(format!(
                    "provider has {} dimensions but collection '{}' has {}",
                    provider_config.dimension,
                    self.storage.collection(),
                    stored.dimension
                )));
            }
            Some(_) => {}
        }

        Ok(())
    }

    /// Embed `text` and append it to the collection.
    ///
    /// Duplicate text is accepted and stored again.
    ///
    /// # Returns
    /// The assigned passage ID
    pub async fn add(&mut self, text: &str, metadata: PassageMetadata) -> QueryResult<i64> {
        let embedding = self.embedding_provider.embed(text).await?;

        let mut passage = Passage::new(text, metadata);
        passage.embedding = Some(embedding);

        Ok(self.storage.insert_passage(&passage).await?)
    }

    /// Embed a batch of passages with one provider call and insert each one.
    ///
    /// Returns one result per passage so a single failed insert does not hide
    /// the others. The embedding call itself is all-or-nothing.
    pub async fn add_batch(&mut self, passages: &[Passage]) -> QueryResult<Vec<QueryResult<i64>>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = passages.iter().map(|p| p.text.as_str()).collect();
        let embeddings = self.embedding_provider.embed_batch(&texts).await?;

        let mut results = Vec::with_capacity(passages.len());
        for (passage, embedding) in passages.iter().zip(embeddings) {
            let mut with_embedding = passage.clone();
            with_embedding.embedding = Some(embedding);
            results.push(
                self.storage
                    .insert_passage(&with_embedding)
                    .await
                    .map_err(QueryError::from),
            );
        }
        Ok(results)
    }

    /// Return the `k` passages closest to `query`, nearest first.
    ///
    /// Returns fewer than `k` hits when the collection is smaller, and an
    /// empty vector for an empty collection or `k == 0`.
    pub async fn search(&self, query: &str, k: usize) -> QueryResult<Vec<ScoredPassage>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedding_provider.embed(query).await?;
        let passages = self.storage.get_all_passages().await?;

        let mut results = Vec::with_capacity(passages.len());
        for passage in passages {
            let score = match passage.embedding.as_deref() {
                Some(stored) if stored.len() != query_embedding.len() => {
                    return Err(QueryError::DimensionMismatch {
                        query: query_embedding.len(),
                        stored: stored.len(),
                        passage_id: passage.id.unwrap_or_default(),
                    });
                }
                Some(stored) => cosine_similarity(&query_embedding, stored),
                None => 0.0,
            };
            results.push(ScoredPassage::new(passage, score));
        }

        // Stable sort keeps insertion order among equal scores
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);

        debug!(
            "Search returned {} hits (top score {:?})",
            results.len(),
            results.first().map(|r| r.score)
        );
        Ok(results)
    }

    /// Number of passages in the collection.
    pub async fn count(&self) -> QueryResult<usize> {
        Ok(self.storage.count_passages().await?)
    }

    pub fn embedding_provider(&self) -> &E {
        &self.embedding_provider
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

#[async_trait]
impl<E, S> PassageRetriever for VectorStore<E, S>
where
    E: EmbeddingProvider,
    S: PassageStorage,
{
    async fn retrieve(&self, query: &str, k: usize) -> QueryResult<Vec<String>> {
        Ok(self
            .search(query, k)
            .await?
            .into_iter()
            .map(|hit| hit.passage.text)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingResult;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    // Mock EmbeddingProvider that looks up fixed vectors by text
    struct MockEmbeddingProvider {
        vectors: HashMap<String, Vec<f32>>,
        dimension: usize,
        model_name: String,
        calls: Arc<Mutex<usize>>,
        should_fail: bool,
    }

    impl MockEmbeddingProvider {
        fn new(vectors: &[(&str, Vec<f32>)]) -> Self {
            Self {
                vectors: vectors
                    .iter()
                    .map(|(text, v)| (text.to_string(), v.clone()))
                    .collect(),
                dimension: 3,
                model_name: "mock-model".to_string(),
                calls: Arc::new(Mutex::new(0)),
                should_fail: false,
            }
        }

        fn with_failure() -> Self {
            let mut provider = Self::new(&[]);
            provider.should_fail = true;
            provider
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MockEmbeddingProvider {
        async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
            *self.calls.lock().unwrap() += 1;
            if self.should_fail {
                return Err(EmbeddingError::ApiError("Mock embedding failure".to_string()));
            }
            Ok(self
                .vectors
                .get(text)
                .cloned()
                .unwrap_or_else(|| vec![0.0; self.dimension]))
        }

        async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
            let mut results = Vec::new();
            for text in texts {
                results.push(self.embed(text).await?);
            }
            Ok(results)
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn model_name(&self) -> &str {
            &self.model_name
        }
    }

    async fn store_with(vectors: &[(&str, Vec<f32>)]) -> VectorStore<MockEmbeddingProvider, SqliteStorage> {
        let storage = SqliteStorage::open_in_memory("test").unwrap();
        let mut store = VectorStore::new(MockEmbeddingProvider::new(vectors), storage);
        store.initialize().await.unwrap();
        store
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_search_orders_nearest_first() {
        let vectors = [
            ("query", vec![1.0, 0.0, 0.0]),
            ("far", vec![0.0, 1.0, 0.0]),
            ("near", vec![0.9, 0.1, 0.0]),
            ("exact", vec![1.0, 0.0, 0.0]),
        ];
        let mut store = store_with(&vectors).await;
        for text in ["far", "near", "exact"] {
            store.add(text, PassageMetadata::new()).await.unwrap();
        }

        let results = store.search("query", 3).await.unwrap();
        let texts: Vec<&str> = results.iter().map(|r| r.passage.text.as_str()).collect();
        assert_eq!(texts, vec!["exact", "near", "far"]);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_search_returns_min_of_k_and_n() {
        let mut store = store_with(&[("a", vec![1.0, 0.0, 0.0]), ("b", vec![0.0, 1.0, 0.0])]).await;
        store.add("a", PassageMetadata::new()).await.unwrap();
        store.add("b", PassageMetadata::new()).await.unwrap();

        assert_eq!(store.search("a", 1).await.unwrap().len(), 1);
        assert_eq!(store.search("a", 2).await.unwrap().len(), 2);
        assert_eq!(store.search("a", 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_search_empty_collection() {
        let store = store_with(&[]).await;
        assert!(store.search("anything", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_k_skips_embedding() {
        let store = store_with(&[]).await;
        let calls = store.embedding_provider().calls.clone();

        assert!(store.search("anything", 0).await.unwrap().is_empty());
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_add_keeps_duplicates_and_metadata() {
        let mut store = store_with(&[("dup", vec![1.0, 0.0, 0.0])]).await;
        let mut metadata = PassageMetadata::new();
        metadata.insert("id".to_string(), "1.34".to_string());

        store.add("dup", metadata.clone()).await.unwrap();
        store.add("dup", metadata).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        let hits = store.search("dup", 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].passage.metadata.get("id").map(String::as_str), Some("1.34"));
    }

    #[tokio::test]
    async fn test_add_batch_inserts_all() {
        let mut store = store_with(&[]).await;
        let passages = vec![
            Passage::new("one", PassageMetadata::new()),
            Passage::new("two", PassageMetadata::new()),
        ];

        let results = store.add_batch(&passages).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_embedding_error_propagation() {
        let storage = SqliteStorage::open_in_memory("test").unwrap();
        let mut store = VectorStore::new(MockEmbeddingProvider::with_failure(), storage);
        store.initialize().await.unwrap();

        match store.search("query", 3).await {
            Err(QueryError::EmbeddingError(_)) => {}
            other => panic!("Expected EmbeddingError, got {:?}", other.map(|r| r.len())),
        }
        assert!(store.add("text", PassageMetadata::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_config_mismatch_is_rejected() {
        let mut storage = SqliteStorage::open_in_memory("test").unwrap();
        storage.initialize().await.unwrap();
        storage
            .store_config(&EmbeddingConfig {
                model_name: "other-model".to_string(),
                dimension: 3,
            })
            .await
            .unwrap();

        let mut store = VectorStore::new(MockEmbeddingProvider::new(&[]), storage);
        match store.initialize().await {
            Err(QueryError::ConfigMismatch(msg)) => {
                assert!(msg.contains("mock-model"));
                assert!(msg.contains("other-model"));
            }
            other => panic!("Expected ConfigMismatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_retriever_returns_texts() {
        let mut store = store_with(&[("q", vec![1.0, 0.0, 0.0]), ("hit", vec![1.0, 0.0, 0.0])]).await;
        store.add("hit", PassageMetadata::new()).await.unwrap();

        let texts = store.retrieve("q", 2).await.unwrap();
        assert_eq!(texts, vec!["hit".to_string()]);
    }
}
