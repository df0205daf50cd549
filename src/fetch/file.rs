// Local file fetcher
use anyhow::Context;
use async_trait::async_trait;

use super::ByteFetcher;

/// Reads audio resources from the local filesystem.
pub struct FileFetcher;

#[async_trait]
impl ByteFetcher for FileFetcher {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, anyhow::Error> {
        tokio::fs::read(locator)
            .await
            .with_context(|| format!("failed to read audio file: {}", locator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_existing_file() {
        let path = std::env::temp_dir().join("soundcue-test-fetch.bin");
        std::fs::write(&path, b"audio bytes").unwrap();

        let bytes = FileFetcher.fetch(path.to_str().unwrap()).await.unwrap();
        assert_eq!(bytes, b"audio bytes");

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let result = FileFetcher.fetch("/nonexistent/soundcue-test.wav").await;
        assert!(result.is_err());
    }
}
