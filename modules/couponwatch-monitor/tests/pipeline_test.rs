//! End-to-end pipeline tests against mock HTTP boundaries: the stories
//! listing API, the vision inference API, the downstream webhook, and the
//! aggregator page. Only the store is real (in-memory SQLite).

use std::time::Duration;

use chrono_tz::America::Sao_Paulo;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ai_client::OpenAi;
use couponwatch_common::CouponOrigin;
use couponwatch_monitor::{
    AggregatorScraper, Monitor, PollWindow, StoryFeed, VisionExtractor, WebhookForwarder,
};
use couponwatch_store::CouponStore;
use mediafy_client::MediafyClient;

const TIMEOUT: Duration = Duration::from_secs(5);

fn stories_body() -> serde_json::Value {
    serde_json::json!({
        "data": {
            "items": [
                {
                    "id": "318_video",
                    "taken_at": 1714000000i64,
                    "is_video": true,
                    "media_type": 2,
                    "image_versions": {
                        "items": [{"url": "https://cdn.example/video-thumb.jpg"}]
                    }
                },
                {
                    "id": "318_image",
                    "taken_at": 1714000100i64,
                    "is_video": false,
                    "media_type": 1,
                    "image_versions": {
                        "items": [
                            {"url": "https://cdn.example/story-high.jpg", "width": 1080, "height": 1920},
                            {"url": "https://cdn.example/story-low.jpg", "width": 320, "height": 568}
                        ]
                    }
                }
            ]
        }
    })
}

fn inference_body(reply: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{"message": {"content": reply}}]
    })
}

async fn test_store() -> CouponStore {
    let store = CouponStore::connect("sqlite::memory:").await.unwrap();
    store.migrate().await.unwrap();
    store
}

fn build_monitor(
    listing_url: &str,
    inference_url: &str,
    webhook_url: &str,
    site_url: &str,
    store: CouponStore,
) -> Monitor {
    let feed = StoryFeed::new(
        MediafyClient::with_timeout("test-key", "test-host", TIMEOUT)
            .with_base_url(listing_url),
        "shopee_br",
    );
    let extractor = VisionExtractor::new(
        OpenAi::new("test-key", "gpt-4o")
            .with_base_url(inference_url)
            .with_timeout(TIMEOUT),
    );
    let aggregator = AggregatorScraper::new(site_url, TIMEOUT);
    let forwarder = WebhookForwarder::new(webhook_url, TIMEOUT);
    let window = PollWindow::new(true, Sao_Paulo);

    Monitor::new(feed, extractor, aggregator, store, forwarder, window)
}

#[tokio::test]
async fn feed_pipeline_end_to_end() {
    let listing = MockServer::start().await;
    let inference = MockServer::start().await;
    let webhook = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/stories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(stories_body()))
        .mount(&listing)
        .await;

    // Exactly one inference call: the video item never reaches extraction.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(inference_body(
            "```json\n{\"codigo\": \"ABC123\", \"horario\": \"19H\"}\n```",
        )))
        .expect(1)
        .mount(&inference)
        .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&webhook)
        .await;

    let store = test_store().await;
    let monitor = build_monitor(
        &listing.uri(),
        &inference.uri(),
        &webhook.uri(),
        "http://127.0.0.1:9/unused",
        store.clone(),
    );

    let stats = monitor.run_once().await;
    assert_eq!(stats.items_seen, 2);
    assert_eq!(stats.images_processed, 1);
    assert_eq!(stats.new_coupons, 1);
    assert_eq!(stats.delivered, 1);

    let coupon = store.get("ABC123").await.unwrap().expect("coupon stored");
    assert_eq!(coupon.origin, CouponOrigin::SocialFeed);
    assert!(coupon.sent, "sent flips after the webhook ack");
    assert_eq!(coupon.valid_time.as_deref(), Some("19H"));
    assert_eq!(
        coupon.source_image_url.as_deref(),
        Some("https://cdn.example/story-high.jpg")
    );
    let details = coupon.details.expect("provenance recorded");
    assert_eq!(details["story_id"], "318_image");
}

#[tokio::test]
async fn second_run_deduplicates() {
    let listing = MockServer::start().await;
    let inference = MockServer::start().await;
    let webhook = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/stories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(stories_body()))
        .mount(&listing)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(inference_body(
            "{\"codigo\": \"DUP1234\", \"horario\": null}",
        )))
        .mount(&inference)
        .await;
    // Only the first run has a new coupon to deliver.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&webhook)
        .await;

    let store = test_store().await;
    let monitor = build_monitor(
        &listing.uri(),
        &inference.uri(),
        &webhook.uri(),
        "http://127.0.0.1:9/unused",
        store.clone(),
    );

    let first = monitor.run_once().await;
    assert_eq!(first.new_coupons, 1);

    let second = monitor.run_once().await;
    assert_eq!(second.new_coupons, 0);
    assert_eq!(second.duplicates, 1);
    assert_eq!(store.latest(10, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_delivery_stays_pending_until_resend() {
    let listing = MockServer::start().await;
    let inference = MockServer::start().await;
    let dead_webhook = MockServer::start().await;
    let live_webhook = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/stories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(stories_body()))
        .mount(&listing)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(inference_body(
            "{\"codigo\": \"RETRY99\", \"horario\": \"21H\"}",
        )))
        .mount(&inference)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&dead_webhook)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&live_webhook)
        .await;

    let store = test_store().await;

    let failing = build_monitor(
        &listing.uri(),
        &inference.uri(),
        &dead_webhook.uri(),
        "http://127.0.0.1:9/unused",
        store.clone(),
    );
    let stats = failing.run_once().await;
    assert_eq!(stats.new_coupons, 1);
    assert_eq!(stats.delivered, 0);
    assert_eq!(stats.failures, 1);

    let coupon = store.get("RETRY99").await.unwrap().unwrap();
    assert!(!coupon.sent, "failed delivery leaves the coupon pending");

    // A later bulk pass against a healthy webhook delivers it.
    let healthy = build_monitor(
        &listing.uri(),
        &inference.uri(),
        &live_webhook.uri(),
        "http://127.0.0.1:9/unused",
        store.clone(),
    );
    let (attempted, delivered) = healthy.send_pending().await;
    assert_eq!((attempted, delivered), (1, 1));
    assert!(store.get("RETRY99").await.unwrap().unwrap().sent);
}

#[tokio::test]
async fn listing_failure_is_a_quiet_empty_cycle() {
    let listing = MockServer::start().await;
    let inference = MockServer::start().await;
    let webhook = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/stories"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&listing)
        .await;
    // Neither extraction nor delivery may be attempted.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&inference)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&webhook)
        .await;

    let store = test_store().await;
    let monitor = build_monitor(
        &listing.uri(),
        &inference.uri(),
        &webhook.uri(),
        "http://127.0.0.1:9/unused",
        store.clone(),
    );

    let stats = monitor.run_once().await;
    assert_eq!(stats.items_seen, 0);
    assert!(store.latest(10, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn unparseable_inference_reply_skips_the_item() {
    let listing = MockServer::start().await;
    let inference = MockServer::start().await;
    let webhook = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/stories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(stories_body()))
        .mount(&listing)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(inference_body(
            "I could not find any coupon in this picture.",
        )))
        .mount(&inference)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&webhook)
        .await;

    let store = test_store().await;
    let monitor = build_monitor(
        &listing.uri(),
        &inference.uri(),
        &webhook.uri(),
        "http://127.0.0.1:9/unused",
        store.clone(),
    );

    let stats = monitor.run_once().await;
    assert_eq!(stats.images_processed, 1);
    assert_eq!(stats.new_coupons, 0);
    assert!(store.latest(10, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn site_scrape_saves_without_forwarding() {
    let site = MockServer::start().await;
    let webhook = MockServer::start().await;

    let page = r#"
        <html><body>
        <div class="sc-ebcb22be-2">
            <h3>Cupom Shopee</h3>
            <div>R$ 20 de desconto em moda</div>
            <button>Pegar cupom</button>
            <div>MODA20OFF</div>
            <span>há 2 dias</span>
        </div>
        <div class="sc-ebcb22be-2">
            <h3>Frete</h3>
            <div>Use o código FRETE15 hoje</div>
        </div>
        </body></html>
    "#;

    Mock::given(method("GET"))
        .and(path("/lojas/shopee"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&site)
        .await;
    // Site coupons are persisted only — the webhook must stay silent.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&webhook)
        .await;

    let store = test_store().await;
    let monitor = build_monitor(
        "http://127.0.0.1:9/unused",
        "http://127.0.0.1:9/unused",
        &webhook.uri(),
        &format!("{}/lojas/shopee", site.uri()),
        store.clone(),
    );

    let stats = monitor.scrape_site().await;
    assert_eq!(stats.new_coupons, 2);

    let site_coupons = store
        .latest(10, Some(CouponOrigin::AggregatorSite))
        .await
        .unwrap();
    assert_eq!(site_coupons.len(), 2);
    assert!(site_coupons.iter().all(|c| !c.sent));
    assert!(site_coupons.iter().all(|c| c.valid_until.is_some()));

    // Re-scraping the same page only produces duplicates.
    let again = monitor.scrape_site().await;
    assert_eq!(again.new_coupons, 0);
    assert_eq!(again.duplicates, 2);
}
