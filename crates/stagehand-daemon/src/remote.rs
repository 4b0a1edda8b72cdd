use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;

/// Remote version and package endpoints.
pub trait RemoteClient: Send + Sync {
    /// GETs `url` and returns the trimmed body.
    fn fetch_text(&self, url: &str) -> Result<String>;

    /// GETs `url` and writes the body to `dest`, returning the HTTP status code.
    fn download(&self, url: &str, dest: &Path) -> Result<u16>;
}

#[derive(Debug, Clone)]
pub struct HttpRemoteClient {
    client: Client,
}

impl HttpRemoteClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("stagehand/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl RemoteClient for HttpRemoteClient {
    fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("request failed: {url}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("request returned status {status}: {url}"));
        }
        let body = response
            .text()
            .with_context(|| format!("failed reading response body: {url}"))?;
        Ok(body.trim().to_string())
    }

    fn download(&self, url: &str, dest: &Path) -> Result<u16> {
        let mut response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("download failed: {url}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("download returned status {status}: {url}"));
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create download dir: {}", parent.display()))?;
        }
        let mut file = fs::File::create(dest)
            .with_context(|| format!("failed to create download file: {}", dest.display()))?;
        io::copy(&mut response, &mut file)
            .with_context(|| format!("failed writing download to {}", dest.display()))?;
        Ok(status.as_u16())
    }
}

/// Last path segment of a download URL, used to name the local archive.
pub fn file_name_from_url(url: &str) -> Result<String> {
    let parsed = reqwest::Url::parse(url).with_context(|| format!("invalid download url: {url}"))?;
    let name = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("")
        .to_string();
    if name.is_empty() {
        return Err(anyhow!("download url has no file name: {url}"));
    }
    Ok(name)
}
