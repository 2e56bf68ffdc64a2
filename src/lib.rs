//! Axlerate - a retrieval-augmented proof assistant for linear algebra.
//!
//! Given a student's question, the assistant retrieves the relevant
//! definitions and theorems from a persistent vector store, asks a hosted
//! language model for a proof that uses only that material, and asks the
//! model again to grade the proof. Rejected drafts are redrafted a bounded
//! number of times.
//!
//! # Architecture
//!
//! - **models**: Core data structures (Passage, ScoredPassage, EmbeddingConfig)
//! - **embedding**: Text embedding providers (fastembed, OpenAI, feature hashing)
//! - **storage**: Passage persistence (SQLite-based)
//! - **query**: The vector store: add passages, nearest-neighbour search
//! - **llm**: Language model capability and the chat completion client
//! - **workflow**: Retrieve, Draft, Verify, Retry state machine
//! - **server**: HTTP API in front of the workflow
//! - **provider** / **ingestion**: Loading source documents into the store
//! - **config**: Command-line and environment configuration
//!
//! # Example
//!
//! ```ignore
//! use axlerate::{
//!     embedding::hashing::HashingEmbedding,
//!     llm::{ChatCompletionClient, ChatConfig},
//!     query::VectorStore,
//!     workflow::{ProofWorkflow, WorkflowConfig},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = VectorStore::open("./axlerate_db", "ladr_collection", HashingEmbedding::default()).await?;
//!     let model = ChatCompletionClient::new(ChatConfig::new(std::env::var("GROQ_API_KEY")?))?;
//!     let workflow = ProofWorkflow::new(store, model, WorkflowConfig::default());
//!
//!     let outcome = workflow.run("What is a subspace?").await?;
//!     println!("{} (verified: {})", outcome.proof(), outcome.is_compliant());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod embedding;
pub mod ingestion;
pub mod llm;
pub mod models;
pub mod provider;
pub mod query;
pub mod server;
pub mod storage;
pub mod workflow;

// Re-export commonly used types at the crate root
pub use embedding::EmbeddingProvider;
pub use llm::LanguageModel;
pub use models::{EmbeddingConfig, Passage, RelevanceLevel, ScoredPassage};
pub use query::{PassageRetriever, VectorStore};
pub use storage::PassageStorage;
pub use workflow::{ProofWorkflow, RunStatus, WorkflowConfig, WorkflowOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default directory of the persistent vector store
pub const DEFAULT_PERSIST_DIR: &str = "./axlerate_db";

/// Default collection name
pub const DEFAULT_COLLECTION: &str = "ladr_collection";
