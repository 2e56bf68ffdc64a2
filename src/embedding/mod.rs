//! Embedding provider abstraction and implementations.
//!
//! This module defines the interface for text embedding generation and provides
//! implementations for a local model (fastembed), OpenAI-compatible embedding
//! endpoints, and a deterministic feature-hashing embedder.
//!
//! The abstraction allows the vector store to swap between embedding models
//! without changing ingestion or retrieval logic.

pub mod fastembed;
pub mod hashing;
pub mod openai;

use async_trait::async_trait;
use thiserror::Error;

use self::fastembed::FastEmbedProvider;
use self::hashing::HashingEmbedding;
use self::openai::OpenAIEmbedding;

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Network or API communication error
    #[error("API request failed: {0}")]
    ApiError(String),

    /// Invalid input text (e.g., empty, too long)
    #[error("Invalid input text: {0}")]
    InvalidInput(String),

    /// Configuration error (e.g., missing API key)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Other unexpected errors
    #[error("Unexpected error: {0}")]
    Other(String),
}

/// Result type for embedding operations.
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Trait for text embedding providers.
///
/// Implementors generate vector embeddings from text inputs. The trait is
/// async to support API-based embedding services.
///
/// # Example Usage
/// ```ignore
/// let provider = FastEmbedProvider::default()?;
/// let embedding = provider.embed("A subspace contains the zero vector").await?;
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for the given text.
    ///
    /// # Errors
    /// Returns `EmbeddingError` if the embedding generation fails
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>>;

    /// Generate embeddings for multiple texts in a single batch.
    ///
    /// The returned vectors are in the same order as the input texts.
    ///
    /// # Errors
    /// Returns `EmbeddingError` if any embedding generation fails
    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>>;

    /// Get the dimension of embeddings produced by this provider.
    fn dimension(&self) -> usize;

    /// Get the model name/identifier for this provider.
    fn model_name(&self) -> &str;
}

/// Runtime-selected embedding provider.
///
/// Binaries pick the provider from command-line flags, so the concrete type is
/// only known at startup.
#[derive(Debug)]
pub enum DynamicEmbeddingProvider {
    FastEmbed(FastEmbedProvider),
    OpenAI(OpenAIEmbedding),
    Hashing(HashingEmbedding),
}

#[async_trait]
impl EmbeddingProvider for DynamicEmbeddingProvider {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        match self {
            DynamicEmbeddingProvider::FastEmbed(p) => p.embed(text).await,
            DynamicEmbeddingProvider::OpenAI(p) => p.embed(text).await,
            DynamicEmbeddingProvider::Hashing(p) => p.embed(text).await,
        }
    }

    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        match self {
            DynamicEmbeddingProvider::FastEmbed(p) => p.embed_batch(texts).await,
            DynamicEmbeddingProvider::OpenAI(p) => p.embed_batch(texts).await,
            DynamicEmbeddingProvider::Hashing(p) => p.embed_batch(texts).await,
        }
    }

    fn dimension(&self) -> usize {
        match self {
            DynamicEmbeddingProvider::FastEmbed(p) => p.dimension(),
            DynamicEmbeddingProvider::OpenAI(p) => p.dimension(),
            DynamicEmbeddingProvider::Hashing(p) => p.dimension(),
        }
    }

    fn model_name(&self) -> &str {
        match self {
            DynamicEmbeddingProvider::FastEmbed(p) => p.model_name(),
            DynamicEmbeddingProvider::OpenAI(p) => p.model_name(),
            DynamicEmbeddingProvider::Hashing(p) => p.model_name(),
        }
    }
}
