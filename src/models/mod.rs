//! Core data models for the proof assistant.
//!
//! This module contains the data structures shared by storage, retrieval and
//! ingestion: stored passages, their metadata, ranked search hits and the
//! embedding configuration persisted alongside a collection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Free-form string metadata attached to a passage (source, identifier, type).
pub type PassageMetadata = BTreeMap<String, String>;

/// A unit of retrievable knowledge text.
///
/// Passages are created during ingestion and never modified or deleted
/// afterwards. The embedding is filled in by the vector store before the
/// passage is persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Passage {
    /// Unique identifier (database primary key)
    pub id: Option<i64>,

    /// The passage text exactly as ingested
    pub text: String,

    /// Attribution and classification metadata
    #[serde(default)]
    pub metadata: PassageMetadata,

    /// Vector embedding of `text`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Passage {
    /// Create a passage that has not been stored or embedded yet.
    pub fn new(text: impl Into<String>, metadata: PassageMetadata) -> Self {
        Self {
            id: None,
            text: text.into(),
            metadata,
            embedding: None,
        }
    }
}

/// Relevance classification for search results.
///
/// Passages are bucketed by their cosine similarity to the query so that
/// command-line output can show match quality at a glance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RelevanceLevel {
    /// Cosine similarity > 0.95
    Identical,

    /// Cosine similarity > 0.85
    HighlySimilar,

    /// Cosine similarity > 0.70
    Similar,

    /// Anything lower
    Relevant,
}

impl RelevanceLevel {
    /// Determine relevance level from a cosine similarity score.
    pub fn from_score(score: f32) -> Self {
        if score > 0.95 {
            RelevanceLevel::Identical
        } else if score > 0.85 {
            RelevanceLevel::HighlySimilar
        } else if score > 0.70 {
            RelevanceLevel::Similar
        } else {
            RelevanceLevel::Relevant
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RelevanceLevel::Identical => "IDENTICAL",
            RelevanceLevel::HighlySimilar => "HIGHLY_SIMILAR",
            RelevanceLevel::Similar => "SIMILAR",
            RelevanceLevel::Relevant => "RELEVANT",
        }
    }
}

/// A passage ranked against a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPassage {
    /// The stored passage (embedding stripped)
    pub passage: Passage,

    /// Cosine similarity score, higher is closer
    pub score: f32,

    /// Categorical relevance classification
    pub relevance: RelevanceLevel,
}

impl ScoredPassage {
    /// Build a ranked hit, dropping the embedding to keep results light.
    pub fn new(mut passage: Passage, score: f32) -> Self {
        passage.embedding = None;
        Self {
            passage,
            score,
            relevance: RelevanceLevel::from_score(score),
        }
    }
}

/// Configuration for the embedding model.
///
/// Persisted with the collection so that ingestion and query-time embedding
/// always use the same model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbeddingConfig {
    /// Name/identifier of the embedding model (e.g., "AllMiniLML6V2")
    pub model_name: String,

    /// Dimension of the embedding vectors
    pub dimension: usize,
}
