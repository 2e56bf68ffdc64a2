//! OpenAI embedding provider implementation.
//!
//! Calls the `/embeddings` endpoint of OpenAI or any API that speaks the same
//! wire format.

use super::{EmbeddingError, EmbeddingProvider, EmbeddingResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default API base URL.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI embedding provider configuration.
#[derive(Debug, Clone)]
pub struct OpenAIEmbedding {
    client: Client,

    /// OpenAI API key for authentication
    api_key: String,

    /// API base URL, without the trailing `/embeddings`
    base_url: String,

    /// Model identifier (e.g., "text-embedding-3-small")
    model: String,

    /// Expected dimension of the embedding vectors
    embedding_dimension: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Output size of the OpenAI embedding models, None for anything else.
pub fn known_dimension(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

impl OpenAIEmbedding {
    /// Create a new OpenAI embedding provider.
    ///
    /// # Arguments
    /// * `api_key` - OpenAI API key
    /// * `model` - Model name (defaults to "text-embedding-3-small" if None)
    /// * `dimension` - Vector size; required for models [`known_dimension`] does not list
    ///
    /// # Errors
    /// Returns `EmbeddingError::ConfigError` for an unknown model without a
    /// dimension, or a dimension of zero
    pub fn new(api_key: String, model: Option<String>, dimension: Option<usize>) -> EmbeddingResult<Self> {
        let model = model.unwrap_or_else(|| "text-embedding-3-small".to_string());
        let embedding_dimension = match dimension.or_else(|| known_dimension(&model)) {
            Some(0) => {
                return Err(EmbeddingError::ConfigError(
                    "Embedding dimension must be at least 1".to_string(),
                ))
            }
            Some(dimension) => dimension,
            None => {
                return Err(EmbeddingError::ConfigError(format!(
                    "Unknown embedding model '{}'; pass its dimension explicitly",
                    model
                )))
            }
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| Client::new());

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model,
            embedding_dimension,
        })
    }

    /// Point the provider at a different OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbeddingError::ApiError(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiError(format!(
                "Embedding endpoint returned {}: {}",
                status.as_u16(),
                text
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::ApiError(format!("Malformed embedding response: {}", e)))?;

        order_embeddings(parsed.data, texts.len())
    }
}

/// Restore input order from the `index` field and check the count.
fn order_embeddings(mut data: Vec<EmbeddingData>, expected: usize) -> EmbeddingResult<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(EmbeddingError::Other(format!(
            "Expected {} embeddings, received {}",
            expected,
            data.len()
        )));
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbedding {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Text cannot be empty".to_string()));
        }

        self.request(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Other("No embedding generated".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        if texts.iter().any(|text| text.trim().is_empty()) {
            return Err(EmbeddingError::InvalidInput("All texts must be non-empty".to_string()));
        }

        self.request(texts).await
    }

    fn dimension(&self) -> usize {
        self.embedding_dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAIEmbedding {
        OpenAIEmbedding::new("key".to_string(), None, None).unwrap()
    }

    #[test]
    fn test_dimension_from_model_name() {
        let small = provider();
        assert_eq!(small.model_name(), "text-embedding-3-small");
        assert_eq!(small.dimension(), 1536);

        let large =
            OpenAIEmbedding::new("key".to_string(), Some("text-embedding-3-large".to_string()), None).unwrap();
        assert_eq!(large.dimension(), 3072);
    }

    #[test]
    fn test_unknown_model_needs_explicit_dimension() {
        let model = Some("nomic-embed-text".to_string());
        assert!(matches!(
            OpenAIEmbedding::new("key".to_string(), model.clone(), None),
            Err(EmbeddingError::ConfigError(_))
        ));

        let local = OpenAIEmbedding::new("key".to_string(), model.clone(), Some(768)).unwrap();
        assert_eq!(local.dimension(), 768);

        assert!(OpenAIEmbedding::new("key".to_string(), model, Some(0)).is_err());
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let provider = provider().with_base_url("http://localhost:8080/v1/");
        assert_eq!(provider.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_order_embeddings_sorts_by_index() {
        let data = vec![
            EmbeddingData { index: 1, embedding: vec![2.0] },
            EmbeddingData { index: 0, embedding: vec![1.0] },
        ];
        let ordered = order_embeddings(data, 2).unwrap();
        assert_eq!(ordered, vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn test_order_embeddings_rejects_count_mismatch() {
        let data = vec![EmbeddingData { index: 0, embedding: vec![1.0] }];
        assert!(matches!(order_embeddings(data, 2), Err(EmbeddingError::Other(_))));
    }

    #[tokio::test]
    async fn test_empty_text_rejected_without_network() {
        let provider = provider().with_base_url("http://127.0.0.1:1");
        assert!(matches!(provider.embed(" ").await, Err(EmbeddingError::InvalidInput(_))));
        assert_eq!(provider.embed_batch(&[]).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_api_error() {
        let provider = provider().with_base_url("http://127.0.0.1:1");
        assert!(matches!(provider.embed("vector").await, Err(EmbeddingError::ApiError(_))));
    }
}
