//! JSON seed file source.
//!
//! Accepts a JSON array of records:
//!
//! ```json
//! [
//!   {"text": "Definition 1.19 ...", "meta": {"id": "1.19", "type": "definition"}}
//! ]
//! ```
//!
//! Non-string metadata values are stored in their JSON text form.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{PassageProvider, ProviderError, ProviderResult};
use crate::models::{Passage, PassageMetadata};

#[derive(Debug, Deserialize)]
struct SeedRecord {
    text: String,
    #[serde(default)]
    meta: serde_json::Map<String, Value>,
}

/// Passages loaded from a JSON seed file.
#[derive(Debug, Clone)]
pub struct JsonSeedProvider {
    name: String,
    passages: Vec<Passage>,
}

impl JsonSeedProvider {
    /// Parse seed records from a JSON string.
    ///
    /// Records whose text is blank are skipped.
    pub fn from_json_str(json: &str) -> ProviderResult<Self> {
        let records: Vec<SeedRecord> =
            serde_json::from_str(json).map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let passages = records
            .into_iter()
            .filter(|record| !record.text.trim().is_empty())
            .map(|record| Passage::new(record.text.trim(), flatten_meta(record.meta)))
            .collect();

        Ok(Self {
            name: "in-memory seed".to_string(),
            passages,
        })
    }

    pub async fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;

        let mut provider = Self::from_json_str(&content)?;
        provider.name = format!("seed file {}", path.display());
        debug!("Loaded {} seed passages from {}", provider.passages.len(), path.display());
        Ok(provider)
    }
}

fn flatten_meta(meta: serde_json::Map<String, Value>) -> PassageMetadata {
    meta.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect()
}

#[async_trait]
impl PassageProvider for JsonSeedProvider {
    async fn fetch_passages(&self) -> ProviderResult<Vec<Passage>> {
        Ok(self.passages.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
