//! Embedder backed by an OpenAI-compatible `/v1/embeddings` endpoint

use super::Embedder;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_DIMENSIONS: usize = 384;

/// Embedder that uses external HTTP service (vLLM, OpenAI, etc.)
pub struct HttpEmbedder {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    dimensions: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        dimensions: Option<usize>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            dimensions: dimensions.unwrap_or(DEFAULT_DIMENSIONS),
        })
    }

    fn endpoint(&self) -> String {
        if self.base_url.ends_with("/v1") {
            format!("{}/embeddings", self.base_url)
        } else {
            format!("{}/v1/embeddings", self.base_url)
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let mut req = self.http_client.post(self.endpoint()).json(&request);
        if let Some(ref api_key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ExternalError(format!(
                "Embedding service error (HTTP {}): {}",
                status, body
            )));
        }

        let mut data = response.json::<EmbedResponse>().await?.data;
        if data.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, service returned {}",
                texts.len(),
                data.len()
            )));
        }
        data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));

        let embeddings: Vec<Vec<f32>> = data.into_iter().map(|d| d.embedding).collect();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimensions) {
            return Err(Error::Embedding(format!(
                "model {} returned {} dimensions, expected {}",
                self.model,
                bad.len(),
                self.dimensions
            )));
        }

        debug!(model = %self.model, count = embeddings.len(), "Embedded batch");
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_normalization() {
        let plain = HttpEmbedder::new("http://localhost:8000/", "m", None, None, 5).unwrap();
        assert_eq!(plain.endpoint(), "http://localhost:8000/v1/embeddings");
        assert_eq!(plain.dimensions(), DEFAULT_DIMENSIONS);

        let versioned = HttpEmbedder::new("https://api.example.com/v1", "m", None, Some(8), 5).unwrap();
        assert_eq!(versioned.endpoint(), "https://api.example.com/v1/embeddings");
        assert_eq!(versioned.dimensions(), 8);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        // Unroutable address: any request would fail
        let embedder = HttpEmbedder::new("http://127.0.0.1:9", "m", None, None, 1).unwrap();
        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
    }
}
