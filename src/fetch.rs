use crate::{domain::Fetcher, errors::FetchError};
use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use tracing;

/// Plain HTTP GET with a fixed connect and read timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        tracing::debug!(%url, "HTTP: Downloading");
        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }
        let bytes = resp.bytes().await?;
        tracing::debug!(%url, size = bytes.len(), "HTTP: Download complete");
        Ok(bytes.to_vec())
    }
}

/// The file name a URL downloads to: the last non-empty segment of its path.
pub fn file_name_from_url(url: &str) -> Result<String, FetchError> {
    let parsed = Url::parse(url).map_err(|_| FetchError::NoFileName(url.to_string()))?;
    parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .ok_or_else(|| FetchError::NoFileName(url.to_string()))
}
