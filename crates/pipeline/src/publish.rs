//! Publish adapters: byte-level transfer of the converted deck to its
//! destination, returning a download reference.

use async_trait::async_trait;
use slidelink_core::{Error, Result};
use std::path::PathBuf;

/// Stateless sink for converted decks.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Check the publish target is usable. Called once before any phase
    /// starts; a failure here is [`Error::Configuration`].
    fn validate(&self) -> Result<()>;

    /// Publish the bytes under a key, returning a download reference.
    async fn publish(&self, bytes: &[u8], key: &str) -> Result<String>;
}

/// HTTP publisher: PUTs the deck to `<endpoint>/<key>` and returns that
/// URL as the download reference.
pub struct HttpPublisher {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPublisher {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    fn validate(&self) -> Result<()> {
        let lower = self.endpoint.to_lowercase();
        if self.endpoint.is_empty() {
            return Err(Error::Configuration("Publish endpoint not set".to_string()));
        }
        if !lower.starts_with("http://") && !lower.starts_with("https://") {
            return Err(Error::Configuration(format!(
                "Publish endpoint is not an HTTP URL: {}",
                self.endpoint
            )));
        }
        Ok(())
    }

    async fn publish(&self, bytes: &[u8], key: &str) -> Result<String> {
        let url = format!("{}/{}", self.endpoint.trim_end_matches('/'), key);

        let response = self
            .client
            .put(&url)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| Error::Transient(format!("Upload failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            if status.is_server_error() {
                return Err(Error::Transient(format!("Upload returned {}", status)));
            }
            return Err(Error::Validation(format!("Upload returned {}", status)));
        }

        log::info!("Published {} bytes to {}", bytes.len(), url);
        Ok(url)
    }
}

/// Filesystem publisher: writes the deck below a local directory and
/// returns its path. Used when no object store is configured.
pub struct FsPublisher {
    root: PathBuf,
}

impl FsPublisher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Publisher for FsPublisher {
    fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(Error::Configuration("Output directory not set".to_string()));
        }
        Ok(())
    }

    async fn publish(&self, bytes: &[u8], key: &str) -> Result<String> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;

        log::info!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_publisher_requires_an_http_endpoint() {
        let publisher = HttpPublisher::new("").unwrap();
        assert!(matches!(
            publisher.validate(),
            Err(Error::Configuration(_))
        ));

        let publisher = HttpPublisher::new("s3://bucket").unwrap();
        assert!(matches!(
            publisher.validate(),
            Err(Error::Configuration(_))
        ));

        let publisher = HttpPublisher::new("https://store.example/decks").unwrap();
        assert!(publisher.validate().is_ok());
    }

    #[tokio::test]
    async fn fs_publisher_writes_below_its_root() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = FsPublisher::new(dir.path());
        publisher.validate().unwrap();

        let reference = publisher
            .publish(b"converted", "processed_pptx/out.pptx")
            .await
            .unwrap();

        let written = tokio::fs::read(dir.path().join("processed_pptx/out.pptx"))
            .await
            .unwrap();
        assert_eq!(written, b"converted");
        assert!(reference.contains("processed_pptx"));
    }
}
