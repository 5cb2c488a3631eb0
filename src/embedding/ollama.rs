use super::http::{build_client, endpoint, non_empty, send_json};
use super::{DIMENSION_PROBE_TEXT, EmbeddingProvider};
use crate::error::EmbeddingError;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

const PROVIDER: &str = "ollama";

#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embedding: Vec<f32>,
}

/// Local model served by Ollama (`/api/embeddings`)
pub struct OllamaProvider {
    client: reqwest::Client,
    url: String,
    model: String,
    dimension: OnceCell<usize>,
}

impl OllamaProvider {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, EmbeddingError> {
        let dimension = OnceCell::new_with(known_dimension(model));
        Ok(Self {
            client: build_client(PROVIDER, timeout_secs)?,
            url: endpoint(base_url, "api/embeddings"),
            model: model.to_string(),
            dimension,
        })
    }
}

/// Output sizes of common Ollama embedding models, ignoring the `:tag` suffix
fn known_dimension(model: &str) -> Option<usize> {
    let base = model.split(':').next().unwrap_or(model);
    match base {
        "nomic-embed-text" => Some(768),
        "mxbai-embed-large" => Some(1024),
        "all-minilm" => Some(384),
        "snowflake-arctic-embed" => Some(1024),
        "bge-m3" => Some(1024),
        _ => None,
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OllamaProvider {
    async fn generate_embedding(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>, EmbeddingError> {
        let request = self.client.post(&self.url).json(&OllamaEmbedRequest {
            model: &self.model,
            prompt: text,
        });
        let parsed: OllamaEmbedResponse = send_json(PROVIDER, request, cancel).await?;
        non_empty(PROVIDER, parsed.embedding)
    }

    async fn embedding_dimension(
        &self,
        cancel: &CancellationToken,
    ) -> Result<usize, EmbeddingError> {
        self.dimension
            .get_or_try_init(|| async {
                let probe = self.generate_embedding(DIMENSION_PROBE_TEXT, cancel).await?;
                tracing::debug!("Ollama model {} reports {} dimensions", self.model, probe.len());
                Ok(probe.len())
            })
            .await
            .copied()
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
