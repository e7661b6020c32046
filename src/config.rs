//! Runtime configuration loaded from the environment.
//!
//! Every setting has a sensible default so the binaries run against a local
//! Qdrant and Ollama without any environment preparation. The loaded `Config`
//! is passed explicitly into each pipeline; there is no global configuration
//! cache.

use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration shared by the indexing and query pipelines.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Name of the Qdrant collection used for document storage.
    pub collection_name: String,
    /// Directory scanned for JSON documents during indexing.
    pub data_dir: PathBuf,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Base URL of the Ollama runtime when it is the active provider.
    pub ollama_url: String,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Answer-generation backend used by the `ask` pipeline.
    pub generation_provider: GenerationProvider,
    /// Generation model identifier passed to the provider.
    pub generation_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Number of records embedded and upserted per batch.
    pub batch_size: usize,
    /// Default number of results returned per query.
    pub top_k: usize,
    /// Maximum characters of record text shown per query result.
    pub max_display_chars: usize,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// Local Ollama runtime, reached over HTTP.
    Ollama,
    /// Deterministic byte-hash embeddings; useful offline and in tests.
    Hash,
}

/// Supported answer-generation backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationProvider {
    /// Local Ollama runtime, reached over HTTP.
    Ollama,
    /// No model; answers fall back to an extractive summary of the context.
    None,
}

impl Config {
    /// Load configuration from environment variables, applying defaults for
    /// anything left unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config = Self {
            qdrant_url: load_env("QDRANT_URL")
                .unwrap_or_else(|| "http://127.0.0.1:6333".to_string()),
            qdrant_api_key: load_env("QDRANT_API_KEY"),
            collection_name: load_env("QDRANT_COLLECTION_NAME")
                .unwrap_or_else(|| "company_docs".to_string()),
            data_dir: load_env("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./content")),
            embedding_provider: load_env("EMBEDDING_PROVIDER")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))
                })
                .transpose()?
                .unwrap_or(EmbeddingProvider::Ollama),
            ollama_url: load_env("OLLAMA_URL")
                .unwrap_or_else(|| "http://127.0.0.1:11434".to_string()),
            embedding_model: load_env("EMBEDDING_MODEL")
                .unwrap_or_else(|| "nomic-embed-text".to_string()),
            generation_provider: load_env("GENERATION_PROVIDER")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("GENERATION_PROVIDER".to_string()))
                })
                .transpose()?
                .unwrap_or(GenerationProvider::Ollama),
            generation_model: load_env("GENERATION_MODEL")
                .unwrap_or_else(|| "llama3.2".to_string()),
            embedding_dimension: load_numeric("EMBEDDING_DIMENSION", 768)?,
            batch_size: load_numeric("BATCH_SIZE", 50)?,
            top_k: load_numeric("TOP_K", 3)?,
            max_display_chars: load_numeric("MAX_DISPLAY_CHARS", 500)?,
        };

        tracing::debug!(
            qdrant_url = %config.qdrant_url,
            collection = %config.collection_name,
            data_dir = %config.data_dir.display(),
            provider = ?config.embedding_provider,
            model = %config.embedding_model,
            "Loaded configuration"
        );
        Ok(config)
    }
}

fn load_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_numeric(key: &str, default: usize) -> Result<usize, ConfigError> {
    match load_env(key) {
        Some(value) => {
            let parsed: usize = value
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))?;
            if parsed == 0 {
                return Err(ConfigError::InvalidValue(key.to_string()));
            }
            Ok(parsed)
        }
        None => Ok(default),
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "hash" => Ok(Self::Hash),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for GenerationProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "none" => Ok(Self::None),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parses_known_names() {
        assert_eq!(
            "ollama".parse::<EmbeddingProvider>(),
            Ok(EmbeddingProvider::Ollama)
        );
        assert_eq!(
            "Hash".parse::<EmbeddingProvider>(),
            Ok(EmbeddingProvider::Hash)
        );
        assert!("chroma".parse::<EmbeddingProvider>().is_err());
    }

    #[test]
    fn generation_provider_parses_known_names() {
        assert_eq!(
            "ollama".parse::<GenerationProvider>(),
            Ok(GenerationProvider::Ollama)
        );
        assert_eq!(
            "none".parse::<GenerationProvider>(),
            Ok(GenerationProvider::None)
        );
        assert!("gemini".parse::<GenerationProvider>().is_err());
    }
}
