//! Passage provider module.
//!
//! A `PassageProvider` turns some source document into passages ready for
//! ingestion. Providers return passages without embeddings; the ingestion
//! pipeline embeds and stores them.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Passage;

pub mod json;
pub mod text;

pub use json::JsonSeedProvider;
pub use text::{split_passages, DelimitedTextProvider, DEFAULT_DELIMITER, DEFAULT_SOURCE};

/// Errors that can occur when reading passages from a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Failed to read from the data source
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse the data format
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Invalid provider settings
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Source of passages for the ingestion pipeline.
#[async_trait]
pub trait PassageProvider: Send + Sync {
    /// Every passage this provider holds, in source order.
    async fn fetch_passages(&self) -> ProviderResult<Vec<Passage>>;

    /// Human-readable description for logs.
    fn name(&self) -> &str;
}
