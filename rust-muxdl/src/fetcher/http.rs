use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use std::time::Duration;
use tracing::{debug, warn};

use super::{ByteStream, StreamFetcher};
use crate::domain::StreamVariant;
use crate::{Error, Result};

const DEFAULT_USER_AGENT: &str = concat!(
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) ",
    "AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36"
);

/// Fetches a variant's direct media URL over HTTP.
#[derive(Debug, Clone)]
pub struct HttpStreamFetcher {
    client: reqwest::Client,
}

impl HttpStreamFetcher {
    /// Create a fetcher with a client suited to long-lived media bodies.
    ///
    /// No total request timeout is set: a whole-body timeout would cut off
    /// large downloads part way through.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn build_headers(variant: &StreamVariant) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));

        for (key, value) in &variant.headers {
            match (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(header = %key, variant = %variant.id, "Skipping invalid variant header"),
            }
        }
        headers
    }
}

#[async_trait]
impl StreamFetcher for HttpStreamFetcher {
    async fn open_stream(&self, source_url: &str, variant: &StreamVariant) -> Result<ByteStream> {
        if variant.url.is_empty() {
            return Err(Error::fetch(format!(
                "variant {} has no media url",
                variant.id
            )));
        }

        debug!(source = %source_url, variant = %variant.id, "Opening variant stream");

        let response = self
            .client
            .get(&variant.url)
            .headers(Self::build_headers(variant))
            .send()
            .await
            .map_err(|e| Error::fetch(format!("request for variant {} failed: {e}", variant.id)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(format!(
                "media host answered {status} for variant {}",
                variant.id
            )));
        }

        let id = variant.id.clone();
        let stream = response
            .bytes_stream()
            .map_err(move |e| Error::fetch(format!("stream for variant {id} failed: {e}")));
        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_headers_override_default_agent() {
        let variant = StreamVariant::new("137", false, true, "mp4").with_headers(vec![
            ("User-Agent".to_string(), "custom/1.0".to_string()),
            ("Referer".to_string(), "https://www.youtube.com/".to_string()),
            ("Bad Header".to_string(), "x".to_string()),
        ]);
        let headers = HttpStreamFetcher::build_headers(&variant);
        assert_eq!(headers.get(USER_AGENT).unwrap(), "custom/1.0");
        assert_eq!(headers.get("referer").unwrap(), "https://www.youtube.com/");
        assert_eq!(headers.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_media_url_is_fetch_error() {
        let fetcher = HttpStreamFetcher::new().unwrap();
        let variant = StreamVariant::new("140", true, false, "m4a");
        let err = match fetcher.open_stream("u1", &variant).await {
            Err(err) => err,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(err, Error::Fetch(_)));
    }
}
