use super::http::{build_client, endpoint, non_empty, send_json};
use super::{DIMENSION_PROBE_TEXT, EmbeddingProvider};
use crate::error::EmbeddingError;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

const PROVIDER: &str = "gemini";

#[derive(Debug, Serialize)]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

/// Google Generative Language `models/{model}:embedContent`
pub struct GeminiProvider {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
    dimension: OnceCell<usize>,
}

impl GeminiProvider {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: String,
        timeout_secs: u64,
    ) -> Result<Self, EmbeddingError> {
        let model = model.trim_start_matches("models/").to_string();
        Ok(Self {
            client: build_client(PROVIDER, timeout_secs)?,
            url: endpoint(base_url, &format!("models/{}:embedContent", model)),
            dimension: OnceCell::new_with(known_dimension(&model)),
            model,
            api_key,
        })
    }
}

fn known_dimension(model: &str) -> Option<usize> {
    match model {
        "text-embedding-004" | "embedding-001" => Some(768),
        "gemini-embedding-001" => Some(3072),
        _ => None,
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for GeminiProvider {
    async fn generate_embedding(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>, EmbeddingError> {
        let request = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&EmbedContentRequest {
                model: format!("models/{}", self.model),
                content: Content {
                    parts: [Part { text }],
                },
            });
        let parsed: EmbedContentResponse = send_json(PROVIDER, request, cancel).await?;
        non_empty(PROVIDER, parsed.embedding.values)
    }

    async fn embedding_dimension(
        &self,
        cancel: &CancellationToken,
    ) -> Result<usize, EmbeddingError> {
        self.dimension
            .get_or_try_init(|| async {
                let probe = self.generate_embedding(DIMENSION_PROBE_TEXT, cancel).await?;
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
