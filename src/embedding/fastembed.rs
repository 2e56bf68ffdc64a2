//! FastEmbed embedding provider implementation.
//!
//! Runs sentence-embedding models locally through the fastembed library. The
//! default model is `all-MiniLM-L6-v2` (384 dimensions), which is what the
//! knowledge base is normally built with.

use super::{EmbeddingError, EmbeddingProvider, EmbeddingResult};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task;

/// FastEmbed embedding provider.
///
/// Holds the loaded model behind an async mutex so one instance can be shared
/// across concurrent requests. Inference itself runs on tokio's blocking pool.
#[derive(Clone)]
pub struct FastEmbedProvider {
    /// The embedding model instance
    model: Arc<Mutex<TextEmbedding>>,

    /// Model identifier
    model_name: String,

    /// Expected dimension of the embedding vectors
    embedding_dimension: usize,
}

impl FastEmbedProvider {
    /// Create a new FastEmbed embedding provider.
    ///
    /// # Arguments
    /// * `model` - Optional model to use (defaults to AllMiniLML6V2)
    /// * `cache_dir` - Optional cache directory for model files
    ///
    /// # Errors
    /// Returns `EmbeddingError::ConfigError` if model initialization fails
    pub fn new(model: Option<EmbeddingModel>, cache_dir: Option<PathBuf>) -> EmbeddingResult<Self> {
        let model_type = model.unwrap_or(EmbeddingModel::AllMiniLML6V2);
        let model_name = format!("{:?}", model_type);
        let embedding_dimension = dimension_for(&model_type);

        let mut init_options = InitOptions::new(model_type);
        if let Some(dir) = cache_dir {
            init_options = init_options.with_cache_dir(dir);
        }

        let text_embedding = TextEmbedding::try_new(init_options).map_err(|e| {
            EmbeddingError::ConfigError(format!("Failed to initialize FastEmbed model: {}", e))
        })?;

        Ok(Self {
            model: Arc::new(Mutex::new(text_embedding)),
            model_name,
            embedding_dimension,
        })
    }

    /// Create a new FastEmbed provider with default settings.
    pub fn default() -> EmbeddingResult<Self> {
        Self::new(None, None)
    }
}

/// Parse a user-supplied model name into a fastembed model.
///
/// Accepts both the enum spelling (`BGESmallENV15`) and the usual hub names
/// (`all-MiniLM-L6-v2`, `bge-small-en-v1.5`), case-insensitively.
pub fn parse_model_name(name: &str) -> Option<EmbeddingModel> {
    let key: String = name
        .rsplit('/')
        .next()
        .unwrap_or(name)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();

    match key.as_str() {
        "allminilml6v2" => Some(EmbeddingModel::AllMiniLML6V2),
        "allminilml12v2" => Some(EmbeddingModel::AllMiniLML12V2),
        "bgesmallenv15" => Some(EmbeddingModel::BGESmallENV15),
        "bgebaseenv15" => Some(EmbeddingModel::BGEBaseENV15),
        "bgelargeenv15" => Some(EmbeddingModel::BGELargeENV15),
        "nomicembedtextv1" => Some(EmbeddingModel::NomicEmbedTextV1),
        "nomicembedtextv15" => Some(EmbeddingModel::NomicEmbedTextV15),
        "paraphrasemlminilml12v2" | "paraphrasemultilingualminilml12v2" => {
            Some(EmbeddingModel::ParaphraseMLMiniLML12V2)
        }
        "paraphrasemlmpnetbasev2" | "paraphrasemultilingualmpnetbasev2" => {
            Some(EmbeddingModel::ParaphraseMLMpnetBaseV2)
        }
        _ => None,
    }
}

fn dimension_for(model: &EmbeddingModel) -> usize {
    match model {
        EmbeddingModel::AllMiniLML6V2 => 384,
        EmbeddingModel::AllMiniLML12V2 => 384,
        EmbeddingModel::BGESmallENV15 => 384,
        EmbeddingModel::BGEBaseENV15 => 768,
        EmbeddingModel::BGELargeENV15 => 1024,
        EmbeddingModel::NomicEmbedTextV1 => 768,
        EmbeddingModel::NomicEmbedTextV15 => 768,
        EmbeddingModel::ParaphraseMLMiniLML12V2 => 384,
        EmbeddingModel::ParaphraseMLMpnetBaseV2 => 768,
        _ => 384,
    }
}

impl FastEmbedProvider {
    /// Run inference on the blocking pool; the owned guard moves into the task.
    async fn infer(&self, texts: Vec<String>) -> EmbeddingResult<Vec<Vec<f32>>> {
        let expected = texts.len();
        let mut model = Arc::clone(&self.model).lock_owned().await;

        let vectors = task::spawn_blocking(move || model.embed(texts, None))
            .await
            .map_err(|e| EmbeddingError::Other(format!("Embedding task panicked: {}", e)))?
            .map_err(|e| EmbeddingError::Other(format!("FastEmbed inference failed: {}", e)))?;

        if vectors.len() != expected {
            return Err(EmbeddingError::Other(format!(
                "FastEmbed returned {} vectors for {} inputs",
                vectors.len(),
                expected
            )));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Text cannot be empty".to_string()));
        }

        let mut vectors = self.infer(vec![text.to_owned()]).await?;
        Ok(vectors.swap_remove(0))
    }

    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(pos) = texts.iter().position(|text| text.trim().is_empty()) {
            return Err(EmbeddingError::InvalidInput(format!(
                "Passage {} of the batch is empty",
                pos + 1
            )));
        }

        self.infer(texts.iter().map(|&text| text.to_owned()).collect()).await
    }

    fn dimension(&self) -> usize {
        self.embedding_dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

// TextEmbedding does not implement Debug
impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model_name", &self.model_name)
            .field("embedding_dimension", &self.embedding_dimension)
            .finish()
    }
}
