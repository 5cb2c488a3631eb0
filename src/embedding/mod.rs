//! Embedding providers: local (Ollama) and cloud (OpenAI, Gemini) backends
//! behind one capability trait.

mod gemini;
mod http;
mod ollama;
mod openai;

pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use crate::config::{EmbeddingConfig, ProviderConfig};
use crate::error::EmbeddingError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Text used to discover the output size of models with no known dimension
pub(crate) const DIMENSION_PROBE_TEXT: &str = "dimension probe";

/// Trait for embedding generation
///
/// Implementations check `cancel` before every network call and report a
/// cancelled request as [`EmbeddingError::Cancelled`], never as a plain failure.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text
    async fn generate_embedding(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>, EmbeddingError>;

    /// Output dimensionality, known statically per model or queried once
    async fn embedding_dimension(&self, cancel: &CancellationToken)
    -> Result<usize, EmbeddingError>;

    /// Short backend identifier (e.g. "openai")
    fn provider_name(&self) -> &'static str;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Build the provider selected in the configuration
pub fn create_provider(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    let timeout = config.timeout_secs;
    let provider: Arc<dyn EmbeddingProvider> = match &config.provider {
        ProviderConfig::Ollama { base_url, model } => {
            Arc::new(OllamaProvider::new(base_url, model, timeout)?)
        }
        ProviderConfig::OpenAi {
            api_key,
            model,
            base_url,
        } => {
            let api_key = api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
                .ok_or(EmbeddingError::MissingApiKey("openai"))?;
            Arc::new(OpenAiProvider::new(base_url, model, api_key, timeout)?)
        }
        ProviderConfig::Gemini {
            api_key,
            model,
            base_url,
        } => {
            let api_key = api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
                .ok_or(EmbeddingError::MissingApiKey("gemini"))?;
            Arc::new(GeminiProvider::new(base_url, model, api_key, timeout)?)
        }
    };

    tracing::info!(
        "Using {} embedding provider with model {}",
        provider.provider_name(),
        provider.model_name()
    );
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_provider() {
        let config = EmbeddingConfig::default();
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.provider_name(), "ollama");
        assert_eq!(provider.model_name(), "nomic-embed-text");
    }

    #[test]
    fn test_cloud_provider_requires_key() {
        let config = EmbeddingConfig {
            provider: ProviderConfig::OpenAi {
                api_key: Some("  ".to_string()),
                model: "text-embedding-3-small".to_string(),
                base_url: "https://api.openai.com/v1".to_string(),
            },
            timeout_secs: 30,
        };
        let err = create_provider(&config).err().unwrap();
        assert!(matches!(err, EmbeddingError::MissingApiKey("openai")));

        let config = EmbeddingConfig {
            provider: ProviderConfig::Gemini {
                api_key: None,
                model: "text-embedding-004".to_string(),
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            },
            timeout_secs: 30,
        };
        assert!(matches!(
            create_provider(&config).err().unwrap(),
            EmbeddingError::MissingApiKey("gemini")
        ));
    }
}
