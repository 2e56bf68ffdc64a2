//! Runtime configuration shared by the binaries.
//!
//! Each concern is a clap argument group that binaries flatten into their own
//! `Parser`: [`StoreArgs`] for the vector store and embedding model,
//! [`LlmArgs`] for the chat model, [`WorkflowArgs`] for the proof loop.
//! Secrets come from the environment by default.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::embedding::fastembed::{parse_model_name, FastEmbedProvider};
use crate::embedding::hashing::{HashingEmbedding, DEFAULT_HASHING_DIMENSION};
use crate::embedding::openai::{OpenAIEmbedding, DEFAULT_OPENAI_BASE_URL};
use crate::embedding::{DynamicEmbeddingProvider, EmbeddingError, EmbeddingProvider};
use crate::llm::chat::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::llm::{ChatCompletionClient, ChatConfig, LlmError};
use crate::query::{QueryError, VectorStore};
use crate::storage::sqlite::SqliteStorage;
use crate::workflow::{VerdictPolicy, WorkflowConfig, DEFAULT_MAX_DRAFTS, DEFAULT_RETRIEVAL_K};
use crate::{DEFAULT_COLLECTION, DEFAULT_PERSIST_DIR};

/// Errors raised while turning arguments into components.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No chat API key was supplied
    #[error("GROQ_API_KEY is not set; pass --api-key or export GROQ_API_KEY")]
    MissingApiKey,

    /// OpenAI embeddings were requested without a key
    #[error("OPENAI_API_KEY must be set when using the open-ai embedding provider")]
    MissingOpenAiKey,

    /// A flag value or combination is not usable
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Embedding provider error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector store error: {0}")]
    Store(#[from] QueryError),

    #[error("Language model error: {0}")]
    Llm(#[from] LlmError),

    #[error("Logging error: {0}")]
    Logging(String),
}

/// Result type for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Embedding provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbeddingProviderType {
    /// Local fastembed model (default, no API required)
    FastEmbed,
    /// OpenAI-compatible embeddings API (requires OPENAI_API_KEY)
    OpenAi,
    /// Deterministic feature hashing, no model download
    Hashing,
}

/// How the verifier's answer is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VerdictPolicyArg {
    /// Answer must be exactly YES or NO
    Strict,
    /// Any answer containing YES counts as accepted
    Substring,
}

impl From<VerdictPolicyArg> for VerdictPolicy {
    fn from(arg: VerdictPolicyArg) -> Self {
        match arg {
            VerdictPolicyArg::Strict => VerdictPolicy::Strict,
            VerdictPolicyArg::Substring => VerdictPolicy::Substring,
        }
    }
}

/// Vector store and embedding model options.
#[derive(Debug, Clone, Args)]
pub struct StoreArgs {
    /// Directory holding the persistent vector store
    #[arg(long, value_name = "DIR", default_value = DEFAULT_PERSIST_DIR)]
    pub persist_dir: PathBuf,

    /// Collection name inside the store
    #[arg(long, value_name = "NAME", default_value = DEFAULT_COLLECTION)]
    pub collection: String,

    /// Embedding provider to use
    #[arg(long, value_enum, default_value = "fast-embed")]
    pub embedding_provider: EmbeddingProviderType,

    /// Specific embedding model name (provider-dependent, optional)
    #[arg(long, value_name = "MODEL")]
    pub embedding_model: Option<String>,

    /// FastEmbed model cache directory
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Vector size for the hashing provider
    #[arg(long, value_name = "N", default_value_t = DEFAULT_HASHING_DIMENSION)]
    pub hashing_dimension: usize,

    /// Base URL of an OpenAI-compatible embeddings API
    #[arg(long, value_name = "URL", default_value = DEFAULT_OPENAI_BASE_URL)]
    pub embedding_base_url: String,

    /// Vector size for open-ai models other than text-embedding-3-* and ada-002
    #[arg(long, value_name = "N")]
    pub embedding_dimension: Option<usize>,

    /// API key for the open-ai embedding provider
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,
}

impl StoreArgs {
    /// Create the embedding provider selected by the flags.
    pub fn build_embedding_provider(&self) -> ConfigResult<DynamicEmbeddingProvider> {
        match self.embedding_provider {
            EmbeddingProviderType::FastEmbed => {
                info!("Initializing FastEmbed provider");

                let model = match &self.embedding_model {
                    Some(name) => Some(parse_model_name(name).ok_or_else(|| {
                        ConfigError::Invalid(format!("Unknown FastEmbed model: {}", name))
                    })?),
                    None => None,
                };

                let cache_dir = self.cache_dir.clone().unwrap_or_else(default_cache_dir);
                debug!("Using cache directory: {}", cache_dir.display());

                let provider = FastEmbedProvider::new(model, Some(cache_dir))?;
                info!(
                    "FastEmbed provider initialized: model={}, dimension={}",
                    provider.model_name(),
                    provider.dimension()
                );
                Ok(DynamicEmbeddingProvider::FastEmbed(provider))
            }
            EmbeddingProviderType::OpenAi => {
                let api_key = self
                    .openai_api_key
                    .clone()
                    .filter(|key| !key.trim().is_empty())
                    .ok_or(ConfigError::MissingOpenAiKey)?;

                let provider = OpenAIEmbedding::new(
                    api_key,
                    self.embedding_model.clone(),
                    self.embedding_dimension,
                )?
                .with_base_url(&self.embedding_base_url);
                info!(
                    "OpenAI provider initialized: model={}, dimension={}, endpoint={}",
                    provider.model_name(),
                    provider.dimension(),
                    self.embedding_base_url
                );
                Ok(DynamicEmbeddingProvider::OpenAI(provider))
            }
            EmbeddingProviderType::Hashing => {
                if self.hashing_dimension == 0 {
                    return Err(ConfigError::Invalid(
                        "--hashing-dimension must be at least 1".to_string(),
                    ));
                }
                info!("Using feature-hashing embeddings ({} dims)", self.hashing_dimension);
                Ok(DynamicEmbeddingProvider::Hashing(HashingEmbedding::new(
                    self.hashing_dimension,
                )))
            }
        }
    }

    /// Build the embedding provider and open the persistent collection.
    pub async fn open_store(
        &self,
    ) -> ConfigResult<VectorStore<DynamicEmbeddingProvider, SqliteStorage>> {
        let provider = self.build_embedding_provider()?;
        let store = VectorStore::open(&self.persist_dir, &self.collection, provider).await?;
        info!(
            "Opened collection '{}' in {}",
            self.collection,
            self.persist_dir.display()
        );
        Ok(store)
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|p| p.join("fastembed"))
        .unwrap_or_else(|| PathBuf::from(".cache/fastembed"))
}

/// Chat model options.
#[derive(Debug, Clone, Args)]
pub struct LlmArgs {
    /// API key for the chat completion endpoint
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible chat API
    #[arg(long, value_name = "URL", default_value = DEFAULT_BASE_URL)]
    pub llm_base_url: String,

    /// Chat model identifier
    #[arg(long, value_name = "MODEL", default_value = DEFAULT_MODEL)]
    pub llm_model: String,

    /// Per-call timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 120)]
    pub llm_timeout_secs: u64,

    /// Optional cap on generated tokens per call
    #[arg(long, value_name = "N")]
    pub llm_max_tokens: Option<u32>,
}

impl LlmArgs {
    pub fn chat_config(&self) -> ConfigResult<ChatConfig> {
        let api_key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let mut config = ChatConfig::new(api_key);
        config.base_url = self.llm_base_url.clone();
        config.model = self.llm_model.clone();
        config.timeout_secs = self.llm_timeout_secs;
        config.max_tokens = self.llm_max_tokens;
        Ok(config)
    }

    pub fn build_client(&self) -> ConfigResult<ChatCompletionClient> {
        let client = ChatCompletionClient::new(self.chat_config()?)?;
        info!("Chat model: {} at {}", self.llm_model, self.llm_base_url);
        Ok(client)
    }
}

/// Proof loop options.
#[derive(Debug, Clone, Args)]
pub struct WorkflowArgs {
    /// Passages retrieved per question
    #[arg(long, value_name = "K", default_value_t = DEFAULT_RETRIEVAL_K)]
    pub top_k: usize,

    /// Maximum drafts per question before giving up
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_DRAFTS)]
    pub max_drafts: u32,

    /// How the verifier's answer is interpreted
    #[arg(long, value_enum, default_value = "strict")]
    pub verdict_policy: VerdictPolicyArg,

    /// Keep repeated passages in the retrieved context
    #[arg(long)]
    pub no_dedup: bool,
}

impl WorkflowArgs {
    pub fn to_config(&self) -> ConfigResult<WorkflowConfig> {
        if self.top_k == 0 {
            return Err(ConfigError::Invalid("--top-k must be at least 1".to_string()));
        }
        Ok(WorkflowConfig {
            retrieval_k: self.top_k,
            max_drafts: self.max_drafts.max(1),
            dedup_context: !self.no_dedup,
            verdict_policy: self.verdict_policy.into(),
        })
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str) -> ConfigResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))
}
