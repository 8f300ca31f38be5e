use std::fmt;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, info, warn};

use ai_client::OpenAi;
use couponwatch_common::{Config, Coupon, CouponOrigin, CouponWatchError, NewCoupon};
use couponwatch_store::CouponStore;
use mediafy_client::{MediafyClient, StoryItem};

use crate::aggregator::AggregatorScraper;
use crate::extractor::{Extraction, VisionExtractor};
use crate::forwarder::WebhookForwarder;
use crate::stories::{qualifying_image_url, StoryFeed};
use crate::window::PollWindow;

/// Counters for one pipeline run.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub items_seen: usize,
    pub images_processed: usize,
    pub new_coupons: usize,
    pub duplicates: usize,
    pub delivered: usize,
    pub failures: usize,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} items, {} images, {} new, {} duplicates, {} delivered, {} failures",
            self.items_seen,
            self.images_processed,
            self.new_coupons,
            self.duplicates,
            self.delivered,
            self.failures
        )
    }
}

/// The pipeline orchestrator: time-gated polling over the story feed, the
/// per-item extract → dedup → persist → deliver loop, the aggregator-site
/// path, and the bulk re-send pass. Items are processed strictly
/// sequentially; every failure is contained at item granularity.
pub struct Monitor {
    feed: StoryFeed,
    extractor: VisionExtractor,
    aggregator: AggregatorScraper,
    store: CouponStore,
    forwarder: WebhookForwarder,
    window: PollWindow,
}

impl Monitor {
    pub fn new(
        feed: StoryFeed,
        extractor: VisionExtractor,
        aggregator: AggregatorScraper,
        store: CouponStore,
        forwarder: WebhookForwarder,
        window: PollWindow,
    ) -> Self {
        Self {
            feed,
            extractor,
            aggregator,
            store,
            forwarder,
            window,
        }
    }

    /// Wire up all collaborators from configuration.
    pub fn from_config(config: &Config, store: CouponStore) -> Result<Self, CouponWatchError> {
        let timeout = Duration::from_secs(config.http_timeout_secs);

        let tz: chrono_tz::Tz = config
            .business_timezone
            .parse()
            .map_err(|e| CouponWatchError::Config(format!("invalid BUSINESS_TIMEZONE: {e}")))?;

        let feed = StoryFeed::new(
            MediafyClient::with_timeout(&config.rapidapi_key, &config.rapidapi_host, timeout),
            &config.instagram_username,
        );
        let extractor = VisionExtractor::new(
            OpenAi::new(&config.openai_api_key, &config.openai_model).with_timeout(timeout),
        );
        let aggregator = AggregatorScraper::new(&config.aggregator_url, timeout);
        let forwarder = WebhookForwarder::new(&config.webhook_url, timeout);
        let window = PollWindow::new(config.poll_window_enabled, tz);

        Ok(Self::new(feed, extractor, aggregator, store, forwarder, window))
    }

    pub fn window(&self) -> &PollWindow {
        &self.window
    }

    /// One scheduled polling tick. Outside the polling window this is a
    /// logged no-op; inside it runs the full pipeline.
    pub async fn tick(&self) -> RunStats {
        let local = self.window.local_now();
        info!(local_time = %local.format("%Y-%m-%d %H:%M:%S"), "Monitor tick");

        if !self.window.is_open() {
            info!("Outside polling window, skipping this tick");
            return RunStats::default();
        }

        self.run_once().await
    }

    /// The manual-trigger path: fetch → filter → extract → dedup-save →
    /// deliver → mark-sent, ignoring the polling window.
    pub async fn run_once(&self) -> RunStats {
        let mut stats = RunStats::default();

        let items = match self.feed.fetch().await {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "Failed to fetch stories, nothing to process this cycle");
                return stats;
            }
        };

        if items.is_empty() {
            info!("No stories to analyze this cycle");
            return stats;
        }

        info!(count = items.len(), username = self.feed.username(), "Analyzing stories");

        for item in &items {
            stats.items_seen += 1;

            let Some(coupon) = self.process_item(item, &mut stats).await else {
                continue;
            };

            if self.forwarder.deliver(&coupon).await {
                match self.store.mark_sent(&coupon.code).await {
                    Ok(true) => {
                        stats.delivered += 1;
                        info!(code = %coupon.code, "Coupon delivered and marked sent");
                    }
                    Ok(false) => {
                        warn!(code = %coupon.code, "Delivered coupon no longer in store")
                    }
                    Err(e) => {
                        stats.failures += 1;
                        error!(code = %coupon.code, error = %e, "Failed to mark coupon sent");
                    }
                }
            } else {
                stats.failures += 1;
                error!(code = %coupon.code, "Delivery failed, coupon stays pending");
            }
        }

        info!(%stats, "Monitor run complete");
        stats
    }

    /// One story item through extraction and the dedup gate. Returns the
    /// freshly stored coupon, or `None` for skips, duplicates, and failures —
    /// none of which may interrupt the surrounding loop.
    async fn process_item(&self, item: &StoryItem, stats: &mut RunStats) -> Option<Coupon> {
        let Some(image_url) = qualifying_image_url(item) else {
            debug!(id = item.id.as_deref().unwrap_or("-"), "Item ignored: not a static image");
            return None;
        };

        stats.images_processed += 1;

        let extracted = match self.extractor.extract(image_url).await {
            Extraction::Found(extracted) => extracted,
            Extraction::NotFound { reason } => {
                info!(reason = %reason, "No coupon found in image");
                return None;
            }
        };

        let mut new = NewCoupon::new(&extracted.code, CouponOrigin::SocialFeed);
        new.valid_time = extracted.valid_time;
        new.source_image_url = Some(image_url.to_string());
        new.description = extracted.description;
        new.discount_value = extracted.discount_value;
        new.details = Some(json!({
            "story_id": item.id,
            "taken_at": item.taken_at,
        }));

        match self.store.save(&new).await {
            Ok(Some(coupon)) => {
                stats.new_coupons += 1;
                info!(code = %coupon.code, "New coupon found and stored");
                Some(coupon)
            }
            Ok(None) => {
                stats.duplicates += 1;
                info!(code = %new.code, "Coupon already processed, skipping");
                None
            }
            Err(e) => {
                stats.failures += 1;
                error!(code = %new.code, error = %e, "Failed to save coupon");
                None
            }
        }
    }

    /// The aggregator-site path: scrape the page and push every candidate
    /// through the same dedup gate. Site coupons are persisted only; the
    /// webhook receives feed coupons.
    pub async fn scrape_site(&self) -> RunStats {
        let mut stats = RunStats::default();

        let candidates = match self.aggregator.scrape(Utc::now()).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "Aggregator scrape failed");
                return stats;
            }
        };

        info!(count = candidates.len(), "Aggregator coupon cards parsed");

        for new in &candidates {
            stats.items_seen += 1;
            match self.store.save(new).await {
                Ok(Some(coupon)) => {
                    stats.new_coupons += 1;
                    info!(code = %coupon.code, "New coupon stored from aggregator");
                }
                Ok(None) => stats.duplicates += 1,
                Err(e) => {
                    stats.failures += 1;
                    error!(code = %new.code, error = %e, "Failed to save aggregator coupon");
                }
            }
        }

        info!(%stats, "Site scrape complete");
        stats
    }

    /// Bulk re-send: exactly one delivery attempt per pending record.
    /// Returns (attempted, delivered).
    pub async fn send_pending(&self) -> (usize, usize) {
        let pending = match self.store.unsent().await {
            Ok(pending) => pending,
            Err(e) => {
                error!(error = %e, "Failed to list pending coupons");
                return (0, 0);
            }
        };

        let attempted = pending.len();
        let mut delivered = 0;

        for coupon in &pending {
            if !self.forwarder.deliver(coupon).await {
                continue;
            }
            match self.store.mark_sent(&coupon.code).await {
                Ok(_) => delivered += 1,
                Err(e) => error!(code = %coupon.code, error = %e, "Failed to mark coupon sent"),
            }
        }

        info!(attempted, delivered, "Pending re-send pass complete");
        (attempted, delivered)
    }

    /// Run extraction against an arbitrary image (the control surface's
    /// test endpoint).
    pub async fn test_extraction(&self, image_url: &str) -> Extraction {
        self.extractor.extract(image_url).await
    }
}
