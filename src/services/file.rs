use async_trait::async_trait;
use reqwest::Url;

use crate::loader::{FetchOptions, Transport, TransportError};

/// Reads bundles from the local file system (`file://` locators).
#[derive(Debug, Clone, Default)]
pub struct FileTransport;

impl FileTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for FileTransport {
    fn schemes(&self) -> &[&'static str] {
        &["file"]
    }

    async fn fetch(&self, url: &Url, _options: &FetchOptions) -> Result<Vec<u8>, TransportError> {
        let path = url
            .to_file_path()
            .map_err(|_| TransportError::Connection(format!("not a local path: {}", url)))?;
        Ok(tokio::fs::read(&path).await?)
    }
}
