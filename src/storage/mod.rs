//! Storage layer abstraction and implementations.
//!
//! This module defines the interface for persisting and retrieving passages
//! and their embeddings. The vector store depends only on the trait, so the
//! backend can be swapped without touching retrieval or ingestion.

pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{EmbeddingConfig, Passage};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    ConnectionError(String),

    /// Query execution error
    #[error("Query execution failed: {0}")]
    QueryError(String),

    /// Data serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Schema or migration error
    #[error("Schema error: {0}")]
    SchemaError(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for passage storage backends.
///
/// A storage instance is bound to a single named collection.
#[async_trait]
pub trait PassageStorage: Send + Sync {
    /// Initialize the storage (create tables, indexes, etc.).
    ///
    /// Idempotent: existing data is reused, never recreated.
    async fn initialize(&mut self) -> StorageResult<()>;

    /// Persist the embedding configuration for this collection.
    async fn store_config(&mut self, config: &EmbeddingConfig) -> StorageResult<()>;

    /// Retrieve the embedding configuration, or None if not set yet.
    async fn get_config(&self) -> StorageResult<Option<EmbeddingConfig>>;

    /// Append a passage. The passage must carry its embedding.
    ///
    /// # Returns
    /// The assigned passage ID
    async fn insert_passage(&mut self, passage: &Passage) -> StorageResult<i64>;

    /// Retrieve every passage in the collection, embeddings included.
    ///
    /// Used by brute-force search, which scores every stored passage.
    async fn get_all_passages(&self) -> StorageResult<Vec<Passage>>;

    /// Number of passages in the collection.
    async fn count_passages(&self) -> StorageResult<usize>;

    /// Name of the collection this storage is bound to.
    fn collection(&self) -> &str;
}
