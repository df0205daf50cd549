// Byte-fetch capability
// Resolves a resource locator to the raw bytes of an audio resource

pub mod file;
pub mod http;

pub use file::FileFetcher;
pub use http::HttpFetcher;

use async_trait::async_trait;

/// Fetches the raw bytes behind a resource locator.
///
/// Implementations do not retry and impose no timeout of their own;
/// a failed fetch is reported once and the caller decides what to do.
#[async_trait]
pub trait ByteFetcher: Send + Sync {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, anyhow::Error>;
}

/// Pick a fetcher for the given locator: HTTP(S) URLs go through the
/// network, everything else is treated as a local file path.
pub fn for_locator(locator: &str) -> Box<dyn ByteFetcher> {
    if locator.starts_with("http://") || locator.starts_with("https://") {
        Box::new(HttpFetcher::new())
    } else {
        Box::new(FileFetcher)
    }
}
