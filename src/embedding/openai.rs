use super::http::{build_client, endpoint, non_empty, send_json};
use super::{DIMENSION_PROBE_TEXT, EmbeddingProvider};
use crate::error::EmbeddingError;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

const PROVIDER: &str = "openai";

#[derive(Debug, Serialize)]
struct EmbeddingsRequestBody<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponseBody {
    data: Vec<EmbeddingsResponseItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponseItem {
    embedding: Vec<f32>,
}

/// OpenAI-compatible `/embeddings` endpoint with bearer authentication
pub struct OpenAiProvider {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
    dimension: OnceCell<usize>,
}

impl OpenAiProvider {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: String,
        timeout_secs: u64,
    ) -> Result<Self, EmbeddingError> {
        Ok(Self {
            client: build_client(PROVIDER, timeout_secs)?,
            url: endpoint(base_url, "embeddings"),
            model: model.to_string(),
            api_key,
            dimension: OnceCell::new_with(known_dimension(model)),
        })
    }
}

fn known_dimension(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAiProvider {
    async fn generate_embedding(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>, EmbeddingError> {
        let request = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingsRequestBody {
                model: &self.model,
                input: text,
            });
        let parsed: EmbeddingsResponseBody = send_json(PROVIDER, request, cancel).await?;
        let item = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse {
                provider: PROVIDER,
                reason: "response contained no embeddings".to_string(),
            })?;
        non_empty(PROVIDER, item.embedding)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_dimensions() {
        assert_eq!(known_dimension("text-embedding-3-small"), Some(1536));
        assert_eq!(known_dimension("text-embedding-3-large"), Some(3072));
        assert_eq!(known_dimension("my-finetune"), None);
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.5,-0.25]}],"model":"m"}"#;
        let parsed: EmbeddingsResponseBody = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.5, -0.25]);
    }
}
