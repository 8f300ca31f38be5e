use mediafy_client::{MediafyClient, Result, StoryItem};

/// Source adapter over the stories listing API for one account.
pub struct StoryFeed {
    client: MediafyClient,
    username: String,
}

impl StoryFeed {
    pub fn new(client: MediafyClient, username: impl Into<String>) -> Self {
        Self {
            client,
            username: username.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Current items for the account. Upstream failures surface as errors;
    /// the orchestrator downgrades them to "nothing this cycle".
    pub async fn fetch(&self) -> Result<Vec<StoryItem>> {
        self.client.stories(&self.username).await
    }
}

/// The per-item qualification filter: only static images with at least one
/// listed variant URL go to extraction. Returns the first (best) variant.
pub fn qualifying_image_url(item: &StoryItem) -> Option<&str> {
    if !item.is_static_image() {
        return None;
    }
    item.best_image_url()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(json: &str) -> StoryItem {
        serde_json::from_str(json).expect("invalid test JSON")
    }

    #[test]
    fn video_items_never_qualify() {
        let video = item(
            r#"{"id": "v1", "is_video": true, "media_type": 2,
                "image_versions": {"items": [{"url": "https://cdn.example/thumb.jpg"}]}}"#,
        );
        assert_eq!(qualifying_image_url(&video), None);
    }

    #[test]
    fn image_without_variants_does_not_qualify() {
        let bare = item(r#"{"id": "i1", "is_video": false, "media_type": 1}"#);
        assert_eq!(qualifying_image_url(&bare), None);

        let empty = item(
            r#"{"id": "i2", "is_video": false, "media_type": 1, "image_versions": {"items": []}}"#,
        );
        assert_eq!(qualifying_image_url(&empty), None);
    }

    #[test]
    fn qualifying_item_yields_first_variant() {
        let image = item(
            r#"{"id": "i3", "is_video": false, "media_type": 1,
                "image_versions": {"items": [
                    {"url": "https://cdn.example/best.jpg"},
                    {"url": "https://cdn.example/small.jpg"}
                ]}}"#,
        );
        assert_eq!(
            qualifying_image_url(&image),
            Some("https://cdn.example/best.jpg")
        );
    }
}
