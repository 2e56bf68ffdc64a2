//! Delimited plain-text source.
//!
//! The knowledge base is authored as one UTF-8 file in which passages are
//! separated by lines containing `---`. Every passage gets the same metadata
//! map, typically just the name of the source book.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{PassageProvider, ProviderError, ProviderResult};
use crate::models::{Passage, PassageMetadata};

/// Separator between passages in the source file.
pub const DEFAULT_DELIMITER: &str = "---";

/// Source attribution attached when none is given.
pub const DEFAULT_SOURCE: &str = "Linear Algebra Done Right";

/// Split `content` on the literal `delimiter`, trimming each chunk and
/// dropping the empty ones.
pub fn split_passages(content: &str, delimiter: &str) -> Vec<String> {
    content
        .split(delimiter)
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads passages from a delimited text file.
#[derive(Debug, Clone)]
pub struct DelimitedTextProvider {
    name: String,
    passages: Vec<Passage>,
}

impl DelimitedTextProvider {
    /// Build a provider from in-memory content.
    ///
    /// # Errors
    /// Returns `ProviderError::ConfigError` for an empty delimiter
    pub fn from_content(
        content: &str,
        delimiter: &str,
        metadata: PassageMetadata,
    ) -> ProviderResult<Self> {
        if delimiter.is_empty() {
            return Err(ProviderError::ConfigError(
                "delimiter must not be empty".to_string(),
            ));
        }

        let passages = split_passages(content, delimiter)
            .into_iter()
            .map(|text| Passage::new(text, metadata.clone()))
            .collect();

        Ok(Self {
            name: "in-memory text".to_string(),
            passages,
        })
    }

    /// Read and split a file.
    pub async fn from_file(
        path: impl AsRef<Path>,
        delimiter: &str,
        metadata: PassageMetadata,
    ) -> ProviderResult<Self> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let content = tokio::fs::read_to_string(&path).await?;

        let mut provider = Self::from_content(&content, delimiter, metadata)?;
        provider.name = format!("text file {}", path.display());
        debug!("Split {} into {} passages", path.display(), provider.passages.len());
        Ok(provider)
    }

    /// The default metadata map: `{"source": <source>}`.
    pub fn source_metadata(source: &str) -> PassageMetadata {
        let mut metadata = PassageMetadata::new();
        metadata.insert("source".to_string(), source.to_string());
        metadata
    }
}

#[async_trait]
impl PassageProvider for DelimitedTextProvider {
    async fn fetch_passages(&self) -> ProviderResult<Vec<Passage>> {
        Ok(self.passages.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_split_trims_and_drops_empty_chunks() {
        let content = "\n---\nDefinition 1.19\n\n---\n   \n---\nTheorem 1.34  \n---\n";
        assert_eq!(
            split_passages(content, DEFAULT_DELIMITER),
            vec!["Definition 1.19", "Theorem 1.34"]
        );
    }

    #[test]
    fn test_split_without_delimiter_is_one_passage() {
        assert_eq!(split_passages("  single  ", "---"), vec!["single"]);
        assert!(split_passages("", "---").is_empty());
    }

    #[test]
    fn test_empty_delimiter_is_rejected() {
        assert!(matches!(
            DelimitedTextProvider::from_content("a", "", PassageMetadata::new()),
            Err(ProviderError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_from_file_attaches_metadata() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "First passage\n---\nSecond passage\n").unwrap();

        let metadata = DelimitedTextProvider::source_metadata(DEFAULT_SOURCE);
        let provider = DelimitedTextProvider::from_file(file.path(), DEFAULT_DELIMITER, metadata)
            .await
            .unwrap();

        let passages = provider.fetch_passages().await.unwrap();
        assert_eq!(passages.len(), 2);
        assert_eq!(passages[1].text, "Second passage");
        assert_eq!(
            passages[0].metadata.get("source").map(String::as_str),
            Some(DEFAULT_SOURCE)
        );
        assert!(passages.iter().all(|p| p.embedding.is_none()));
        assert!(provider.name().starts_with("text file"));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let result = DelimitedTextProvider::from_file(
            "/nonexistent/axlerate/ladr.txt",
            DEFAULT_DELIMITER,
            PassageMetadata::new(),
        )
        .await;
        assert!(matches!(result, Err(ProviderError::IoError(_))));
    }
}
