//! URL shortener client (reurl.cc)

use async_trait::async_trait;
use serde::Deserialize;

use crate::{Error, Result};

const REURL_API_URL: &str = "https://api.reurl.cc/shorten";

/// Shortens URLs; always yields either the shortened URL or an error
#[async_trait]
pub trait ShortenUrl: Send + Sync {
    /// Shorten the given URL
    async fn shorten(&self, url: &str) -> Result<String>;
}

/// reurl.cc API client
pub struct ReurlClient {
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ShortenResponse {
    short_url: Option<String>,
}

impl ReurlClient {
    /// Create a client with the given API key
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ShortenUrl for ReurlClient {
    async fn shorten(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .post(REURL_API_URL)
            .header("reurl-api-key", &self.api_key)
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await
            .map_err(|e| Error::Shortener(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Shortener(format!("API error {status}: {body}")));
        }

        let body: ShortenResponse = response
            .json()
            .await
            .map_err(|e| Error::Shortener(format!("bad response body: {e}")))?;

        body.short_url
            .ok_or_else(|| Error::Shortener("response carried no short_url".to_string()))
    }
}
