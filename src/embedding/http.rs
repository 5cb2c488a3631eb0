//! Shared request plumbing for the HTTP embedding backends

use crate::error::EmbeddingError;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub(crate) fn build_client(
    provider: &'static str,
    timeout_secs: u64,
) -> Result<reqwest::Client, EmbeddingError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| EmbeddingError::Transport {
            provider,
            reason: format!("http client build: {e}"),
        })
}

/// Send a request and decode its JSON body, racing every await against `cancel`
///
/// A non-success status is surfaced as [`EmbeddingError::Http`] carrying the
/// response body; failing to read that body never hides the status.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &'static str,
    request: reqwest::RequestBuilder,
    cancel: &CancellationToken,
) -> Result<T, EmbeddingError> {
    if cancel.is_cancelled() {
        return Err(EmbeddingError::Cancelled);
    }

    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(EmbeddingError::Cancelled),
        sent = request.send() => sent.map_err(|e| transport_error(provider, e))?,
    };

    let status = response.status();
    if !status.is_success() {
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EmbeddingError::Cancelled),
            body = response.text() => body.unwrap_or_else(|e| format!("<failed to read body: {e}>")),
        };
        return Err(EmbeddingError::Http {
            provider,
            status: status.as_u16(),
            body,
        });
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(EmbeddingError::Cancelled),
        parsed = response.json::<T>() => parsed.map_err(|e| EmbeddingError::InvalidResponse {
            provider,
            reason: format!("parse embeddings json: {e}"),
        }),
    }
}

fn transport_error(provider: &'static str, err: reqwest::Error) -> EmbeddingError {
    let reason = if err.is_timeout() {
        format!("request timed out: {err}")
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    };
    EmbeddingError::Transport { provider, reason }
}

/// Reject empty vectors so callers never store a zero-length point
pub(crate) fn non_empty(
    provider: &'static str,
    vector: Vec<f32>,
) -> Result<Vec<f32>, EmbeddingError> {
    if vector.is_empty() {
        return Err(EmbeddingError::InvalidResponse {
            provider,
            reason: "empty embedding".to_string(),
        });
    }
    Ok(vector)
}

/// Join a base URL and a path without doubling slashes
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_join() {
        assert_eq!(
            endpoint("http://localhost:11434/", "/api/embeddings"),
            "http://localhost:11434/api/embeddings"
        );
        assert_eq!(endpoint("https://x/v1", "embeddings"), "https://x/v1/embeddings");
    }

    #[test]
    fn test_non_empty() {
        assert!(non_empty("ollama", vec![]).is_err());
        assert_eq!(non_empty("ollama", vec![1.0]).unwrap(), vec![1.0]);
    }

    #[tokio::test]
    async fn test_send_json_checks_cancellation_first() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let client = build_client("test", 5).unwrap();
        // Unroutable address: must not be contacted at all
        let request = client.post("http://10.255.255.1:9/never");
        let result: Result<serde_json::Value, _> = send_json("test", request, &cancel).await;
        assert!(matches!(result, Err(EmbeddingError::Cancelled)));
    }
}
