//! Fetch adapters: byte-level transfer of the input deck.

use async_trait::async_trait;
use slidelink_core::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// User agent sent with fetch requests.
const USER_AGENT: &str = "slidelink/0.1";

/// Byte-level input transfer.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the deck bytes from a source reference.
    ///
    /// Returns [`Error::Validation`] for malformed sources or oversized
    /// payloads (never retried) and [`Error::Transient`] for
    /// network-class failures (retried by the orchestrator).
    async fn fetch(&self, source: &str) -> Result<Vec<u8>>;
}

/// HTTP fetcher with streaming download and a byte ceiling.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl HttpFetcher {
    /// Build a fetcher with the given timeouts and size ceiling.
    pub fn new(connect_timeout: Duration, read_timeout: Duration, max_bytes: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, max_bytes })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, source: &str) -> Result<Vec<u8>> {
        let lower = source.to_lowercase();
        if !lower.starts_with("http://") && !lower.starts_with("https://") {
            return Err(Error::Validation(format!("Invalid URL: {}", source)));
        }

        let response = self
            .client
            .get(source)
            .send()
            .await
            .map_err(|e| Error::Transient(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            // Server-side and throttling statuses are worth retrying.
            if status.is_server_error() || status.as_u16() == 408 || status.as_u16() == 429 {
                return Err(Error::Transient(format!("Remote returned {}", status)));
            }
            return Err(Error::Validation(format!("Remote returned {}", status)));
        }

        // Declared size, when present, is checked before reading a byte.
        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes {
                return Err(Error::Validation(format!(
                    "File too large: {} bytes (max: {})",
                    declared, self.max_bytes
                )));
            }
        }

        let mut response = response;
        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::Transient(format!("Download interrupted: {}", e)))?
        {
            if bytes.len() as u64 + chunk.len() as u64 > self.max_bytes {
                return Err(Error::Validation(format!(
                    "File too large: more than {} bytes received",
                    self.max_bytes
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        log::info!("Fetched {} bytes from {}", bytes.len(), source);
        Ok(bytes)
    }
}

/// Local-file fetcher: treats the source as a filesystem path. Lets the
/// orchestrator run the same pipeline on a deck already on disk.
pub struct FileFetcher {
    max_bytes: u64,
}

impl FileFetcher {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

#[async_trait]
impl Fetcher for FileFetcher {
    async fn fetch(&self, source: &str) -> Result<Vec<u8>> {
        let path = PathBuf::from(source);
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| Error::Validation(format!("Cannot read '{}': {}", source, e)))?;

        if metadata.len() > self.max_bytes {
            return Err(Error::Validation(format!(
                "File too large: {} bytes (max: {})",
                metadata.len(),
                self.max_bytes
            )));
        }

        let bytes = tokio::fs::read(&path).await?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn http_fetcher_rejects_non_http_sources() {
        let fetcher = HttpFetcher::new(
            Duration::from_secs(1),
            Duration::from_secs(1),
            1024,
        )
        .unwrap();
        let err = fetcher.fetch("ftp://host/deck.pptx").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn file_fetcher_reads_local_decks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.pptx");
        tokio::fs::write(&path, b"deck bytes").await.unwrap();

        let fetcher = FileFetcher::new(1024);
        let bytes = fetcher.fetch(path.to_str().unwrap()).await.unwrap();
        assert_eq!(bytes, b"deck bytes");
    }

    #[tokio::test]
    async fn file_fetcher_enforces_the_size_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.pptx");
        tokio::fs::write(&path, vec![0u8; 64]).await.unwrap();

        let fetcher = FileFetcher::new(16);
        let err = fetcher.fetch(path.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn missing_file_is_a_validation_error() {
        let fetcher = FileFetcher::new(1024);
        let err = fetcher.fetch("/no/such/deck.pptx").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
