//! Script and engine references, and fetching their bytes

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use bytes::Bytes;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Unsupported reference: {0}")]
    InvalidReference(String),

    #[error("Invalid inline data: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where a script or binary comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// `http://` or `https://` URL
    Remote(Url),
    /// `file://` URL or absolute path
    Local(PathBuf),
    /// `base64:<data>`
    Inline(Vec<u8>),
}

impl Source {
    pub fn parse(reference: &str) -> Result<Self, FetchError> {
        let reference = reference.trim();

        if let Some(data) = reference.strip_prefix("base64:") {
            return Ok(Self::Inline(general_purpose::STANDARD.decode(data)?));
        }
        if reference.starts_with('/') {
            return Ok(Self::Local(PathBuf::from(reference)));
        }

        let url = Url::parse(reference)
            .map_err(|_| FetchError::InvalidReference(reference.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(Self::Remote(url)),
            "file" => url
                .to_file_path()
                .map(Self::Local)
                .map_err(|()| FetchError::InvalidReference(reference.to_string())),
            _ => Err(FetchError::InvalidReference(reference.to_string())),
        }
    }
}

/// Downloads remote references
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn download(&self, url: &Url) -> Result<Bytes, FetchError>;
}

/// [`Fetcher`] over HTTP(S)
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn download(&self, url: &Url) -> Result<Bytes, FetchError> {
        debug!(url = %url, "Downloading");
        let response = self.client.get(url.clone()).send().await?.error_for_status()?;
        Ok(response.bytes().await?)
    }
}

/// Bytes behind `reference`, downloading through `fetcher` when remote
pub async fn resolve<F: Fetcher + ?Sized>(
    fetcher: &F,
    reference: &str,
) -> Result<Bytes, FetchError> {
    match Source::parse(reference)? {
        Source::Remote(url) => fetcher.download(&url).await,
        Source::Local(path) => Ok(Bytes::from(tokio::fs::read(path).await?)),
        Source::Inline(data) => Ok(Bytes::from(data)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_references() {
        assert_eq!(
            Source::parse("base64:ZWNobyBoaQ==").unwrap(),
            Source::Inline(b"echo hi".to_vec())
        );
        assert_eq!(
            Source::parse("/opt/script.sh").unwrap(),
            Source::Local(PathBuf::from("/opt/script.sh"))
        );
        assert_eq!(
            Source::parse("file:///opt/script.sh").unwrap(),
            Source::Local(PathBuf::from("/opt/script.sh"))
        );
        assert!(matches!(
            Source::parse("https://example.com/s.sh").unwrap(),
            Source::Remote(_)
        ));
    }

    #[test]
    fn test_rejects_unknown_references() {
        assert!(matches!(
            Source::parse("ftp://example.com/s.sh"),
            Err(FetchError::InvalidReference(_))
        ));
        assert!(matches!(
            Source::parse("script.sh"),
            Err(FetchError::InvalidReference(_))
        ));
        assert!(matches!(
            Source::parse("base64:!!!"),
            Err(FetchError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.sh");
        std::fs::write(&path, "echo local").unwrap();

        let data = resolve(&HttpFetcher::new(), path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(&data[..], b"echo local");
    }
}
