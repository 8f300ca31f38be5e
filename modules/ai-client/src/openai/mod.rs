mod client;
pub(crate) mod types;

use std::time::Duration;

use anyhow::Result;

use client::OpenAiClient;
use types::{ChatRequest, WireMessage};

/// OpenAI chat-completions agent. The only call shape this crate supports is
/// a one-shot prompt with an optional image attachment — enough for
/// vision-based text extraction.
#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    model: String,
    base_url: Option<String>,
    timeout: Duration,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Point the client at a different API host (proxies, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn client(&self) -> OpenAiClient {
        let client = OpenAiClient::new(&self.api_key, self.timeout);
        if let Some(ref url) = self.base_url {
            client.with_base_url(url)
        } else {
            client
        }
    }

    /// Send a system prompt plus a user prompt with an attached image URL,
    /// returning the model's raw reply text.
    pub async fn vision_chat(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
        image_url: impl Into<String>,
        max_tokens: u32,
    ) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                WireMessage::system(system),
                WireMessage::user_with_image(user, image_url),
            ],
            max_tokens: Some(max_tokens),
        };

        self.client().chat_text(&request).await
    }
}
