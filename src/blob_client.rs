use crate::config::Config;
use crate::errors::AppError;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded timeout applied to every blob store round-trip. A hung store
/// call must surface as a retryable persistence error, never hang the
/// request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A stored blob as returned by the store's list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobEntry {
    pub pathname: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    blobs: Vec<BlobEntry>,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    url: String,
}

/// HTTP client for the key-addressed blob store.
///
/// The store supports prefix listing, content retrieval by URL, token-gated
/// writes, and conditional writes keyed on a version token (`If-Match` /
/// `If-None-Match`), which is what the record store's optimistic
/// concurrency is built on.
#[derive(Debug, Clone)]
pub struct BlobClient {
    client: Client,
    base_url: String,
    token: String,
}

impl BlobClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, AppError> {
        let token = token.into();
        if token.trim().is_empty() {
            // Fail fast before any read/write can be attempted with a
            // credential that the store would reject.
            return Err(AppError::Configuration(
                "Blob store read-write token is not configured".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(&config.blob_base_url, &config.blob_read_write_token)
    }

    /// Lists blobs whose pathname starts with `prefix`.
    pub async fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>, AppError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/list", self.base_url),
            &[("prefix", prefix)],
        )
        .map_err(|e| AppError::Persistence(format!("Failed to build list URL: {}", e)))?;

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| AppError::Persistence(format!("Blob list request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::Persistence(format!(
                "Blob list returned status {}",
                status
            )));
        }

        let result: ListResponse = response.json().await.map_err(|e| {
            AppError::Persistence(format!("Failed to parse blob list response: {}", e))
        })?;
        Ok(result.blobs)
    }

    /// Fetches a blob's content by its URL. Returns `Ok(None)` when the
    /// blob no longer exists (deleted between list and fetch).
    pub async fn fetch(&self, url: &str) -> Result<Option<String>, AppError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| AppError::Persistence(format!("Blob fetch request failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::Persistence(format!(
                "Blob fetch returned status {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::Persistence(format!("Failed to read blob content: {}", e)))?;
        Ok(Some(body))
    }

    /// Writes a blob at `path`, conditional on the version the caller read.
    ///
    /// `expected_version: None` requires that no blob exists yet
    /// (`If-None-Match: *`); `Some(v)` requires the stored version to still
    /// be `v` (`If-Match`). Returns `Ok(None)` when the precondition failed,
    /// so callers can re-run their read-merge-write cycle. Every other
    /// failure propagates; a write error is never reported as success.
    pub async fn put_conditional(
        &self,
        path: &str,
        body: String,
        content_type: &str,
        expected_version: Option<u64>,
    ) -> Result<Option<BlobEntry>, AppError> {
        let mut request = self
            .client
            .put(format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.token)
            .header("content-type", content_type);
        request = match expected_version {
            Some(version) => request.header("if-match", version.to_string()),
            None => request.header("if-none-match", "*"),
        };

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::Persistence(format!("Blob put request failed: {}", e)))?;

        if response.status() == StatusCode::PRECONDITION_FAILED {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Blob put for '{}' returned {}: {}", path, status, error_text);
            return Err(AppError::Persistence(format!(
                "Blob put returned status {}",
                status
            )));
        }

        let result: PutResponse = response.json().await.map_err(|e| {
            AppError::Persistence(format!("Failed to parse blob put response: {}", e))
        })?;
        Ok(Some(BlobEntry {
            pathname: path.to_string(),
            url: result.url,
        }))
    }

    /// Unconditional write. Used for records outside the versioned merge
    /// path (none today outside tests), kept thin over `put_conditional`'s
    /// transport.
    pub async fn put(
        &self,
        path: &str,
        body: String,
        content_type: &str,
    ) -> Result<BlobEntry, AppError> {
        let response = self
            .client
            .put(format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.token)
            .header("content-type", content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::Persistence(format!("Blob put request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::Persistence(format!(
                "Blob put returned status {}",
                status
            )));
        }
        let result: PutResponse = response.json().await.map_err(|e| {
            AppError::Persistence(format!("Failed to parse blob put response: {}", e))
        })?;
        Ok(BlobEntry {
            pathname: path.to_string(),
            url: result.url,
        })
    }

    /// Deletes the blob at `path`. "Not found" is tolerated: the legacy
    /// cleanup path deletes blobs that may already be gone.
    pub async fn delete(&self, path: &str) -> Result<(), AppError> {
        let response = self
            .client
            .delete(format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| AppError::Persistence(format!("Blob delete request failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("Blob delete for '{}': already gone", path);
            return Ok(());
        }
        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::Persistence(format!(
                "Blob delete returned status {}",
                status
            )));
        }
        Ok(())
    }
}
