pub mod error;
pub mod types;

pub use error::{MediafyError, Result};
pub use types::{ImageCandidate, ImageVersions, StoryItem};

use std::time::Duration;

use types::StoriesEnvelope;

const BASE_URL: &str = "https://mediafy-api.p.rapidapi.com";

pub struct MediafyClient {
    client: reqwest::Client,
    api_key: String,
    host: String,
    base_url: String,
}

impl MediafyClient {
    pub fn new(api_key: &str, host: &str) -> Self {
        Self::with_timeout(api_key, host, Duration::from_secs(30))
    }

    pub fn with_timeout(api_key: &str, host: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key: api_key.to_string(),
            host: host.to_string(),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the client at a different host (tests).
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Fetch the current ephemeral posts for an account. Returns the raw item
    /// list; an unexpected envelope shape is a `Parse` error, not a panic.
    pub async fn stories(&self, username: &str) -> Result<Vec<StoryItem>> {
        let url = format!("{}/v1/stories", self.base_url);

        let resp = self
            .client
            .get(&url)
            .query(&[("username_or_id_or_url", username)])
            .header("x-rapidapi-host", &self.host)
            .header("x-rapidapi-key", &self.api_key)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MediafyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = resp.text().await?;
        let envelope: StoriesEnvelope = serde_json::from_str(&body)?;
        let data = envelope
            .data
            .ok_or_else(|| MediafyError::Parse("response missing data.items".to_string()))?;

        tracing::debug!(username, count = data.items.len(), "Fetched stories");
        Ok(data.items)
    }
}
