//! Remote index cache
//!
//! A shared server may already hold artifacts for content the local machine
//! has never indexed. Lookups are by cache key (content hash); the server
//! answers with the subset it knows. The client is only ever used by artifact
//! indexers and any failure makes them fall back to local computation.

use crate::config::RemoteCacheConfig;
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Client for `POST {url}/indexing/cache`
#[derive(Clone)]
pub struct RemoteCacheClient {
    http_client: reqwest::Client,
    url: String,
    user_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheRequest<'a> {
    keys: &'a [String],
    artifact_id: &'a str,
    repo: &'a str,
}

#[derive(Deserialize)]
struct CacheResponse<T> {
    #[serde(default = "HashMap::new")]
    files: HashMap<String, T>,
}

impl RemoteCacheClient {
    pub fn new(url: impl Into<String>, user_token: Option<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http_client,
            url: url.into().trim_end_matches('/').to_string(),
            user_token,
        })
    }

    /// Build a client when the configuration names an endpoint
    pub fn from_config(config: Option<&RemoteCacheConfig>) -> Result<Option<Self>> {
        match config {
            Some(c) if !c.url.trim().is_empty() => {
                Ok(Some(Self::new(c.url.clone(), c.user_token.clone())?))
            }
            _ => Ok(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch cached artifacts for `keys`; keys the server does not know are absent
    pub async fn get_from_index_cache<T: DeserializeOwned>(
        &self,
        keys: &[String],
        artifact_id: &str,
        repo: &str,
    ) -> Result<HashMap<String, T>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let body = CacheRequest {
            keys,
            artifact_id,
            repo,
        };
        let mut req = self
            .http_client
            .post(format!("{}/indexing/cache", self.url))
            .json(&body);
        if let Some(ref token) = self.user_token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }

        let response = req.send().await?;
        if !response.status().is_success() {
            return Err(Error::ExternalError(format!(
                "Index cache request failed (HTTP {})",
                response.status()
            )));
        }

        let parsed: CacheResponse<T> = response.json().await?;
        debug!(
            artifact = artifact_id,
            requested = keys.len(),
            found = parsed.files.len(),
            "Remote index cache lookup"
        );
        Ok(parsed.files)
    }
}
