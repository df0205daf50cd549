// HTTP fetcher
use anyhow::Context;
use async_trait::async_trait;

use super::ByteFetcher;

/// Fetches audio resources over HTTP(S).
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ByteFetcher for HttpFetcher {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, anyhow::Error> {
        let response = self
            .client
            .get(locator)
            .header("User-Agent", concat!("soundcue/", env!("CARGO_PKG_VERSION")))
            .send()
            .await
            .with_context(|| format!("request to {} failed", locator))?
            .error_for_status()
            .context("server returned an error status")?;

        let bytes = response
            .bytes()
            .await
            .context("error reading response body")?;

        Ok(bytes.to_vec())
    }
}
