use serde::Deserialize;

/// Top-level envelope for the stories endpoint: `{"data": {"items": [...]}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct StoriesEnvelope {
    pub data: Option<StoriesData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StoriesData {
    #[serde(default)]
    pub items: Vec<StoryItem>,
}

/// One ephemeral post from the listing API. Fields the upstream omits are
/// tolerated with defaults — the shape varies between media types.
#[derive(Debug, Clone, Deserialize)]
pub struct StoryItem {
    pub id: Option<String>,
    /// Capture timestamp (unix seconds), kept raw for provenance.
    pub taken_at: Option<i64>,
    #[serde(default)]
    pub is_video: bool,
    pub media_type: Option<i64>,
    pub image_versions: Option<ImageVersions>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageVersions {
    #[serde(default)]
    pub items: Vec<ImageCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageCandidate {
    pub url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Media type marker the API uses for static images.
const MEDIA_TYPE_IMAGE: i64 = 1;

impl StoryItem {
    /// True when the item is a static image rather than a video clip.
    pub fn is_static_image(&self) -> bool {
        !self.is_video && self.media_type == Some(MEDIA_TYPE_IMAGE)
    }

    /// First image variant URL. The API lists variants best-quality-first,
    /// so no dimension comparison is done here.
    pub fn best_image_url(&self) -> Option<&str> {
        self.image_versions
            .as_ref()?
            .items
            .first()?
            .url
            .as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "data": {
            "items": [
                {
                    "id": "318_abc",
                    "taken_at": 1714000000,
                    "is_video": false,
                    "media_type": 1,
                    "image_versions": {
                        "items": [
                            {"url": "https://cdn.example/high.jpg", "width": 1080, "height": 1920},
                            {"url": "https://cdn.example/low.jpg", "width": 320, "height": 568}
                        ]
                    }
                },
                {
                    "id": "318_def",
                    "taken_at": 1714000100,
                    "is_video": true,
                    "media_type": 2
                }
            ]
        }
    }"#;

    #[test]
    fn envelope_deserializes() {
        let envelope: StoriesEnvelope = serde_json::from_str(SAMPLE).unwrap();
        let items = envelope.data.unwrap().items;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id.as_deref(), Some("318_abc"));
    }

    #[test]
    fn static_image_detection() {
        let envelope: StoriesEnvelope = serde_json::from_str(SAMPLE).unwrap();
        let items = envelope.data.unwrap().items;
        assert!(items[0].is_static_image());
        assert!(!items[1].is_static_image());
    }

    #[test]
    fn best_image_url_takes_first_variant() {
        let envelope: StoriesEnvelope = serde_json::from_str(SAMPLE).unwrap();
        let items = envelope.data.unwrap().items;
        assert_eq!(
            items[0].best_image_url(),
            Some("https://cdn.example/high.jpg")
        );
        assert_eq!(items[1].best_image_url(), None);
    }

    #[test]
    fn missing_media_type_is_not_an_image() {
        let item: StoryItem = serde_json::from_str(r#"{"id": "x"}"#).unwrap();
        assert!(!item.is_static_image());
    }
}
