use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Acquisition channel for a coupon record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponOrigin {
    SocialFeed,
    AggregatorSite,
    Manual,
}

impl CouponOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponOrigin::SocialFeed => "social_feed",
            CouponOrigin::AggregatorSite => "aggregator_site",
            CouponOrigin::Manual => "manual",
        }
    }

    /// Tolerant parse for values coming from query params or stored rows.
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "social_feed" | "social-feed" | "feed" | "stories" => CouponOrigin::SocialFeed,
            "aggregator_site" | "aggregator-site" | "site" | "aggregator" => {
                CouponOrigin::AggregatorSite
            }
            _ => CouponOrigin::Manual,
        }
    }
}

impl fmt::Display for CouponOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discount code with provenance and delivery status. The `code` is the
/// identity key: no two stored coupons share one. Codes are kept exactly as
/// extracted — no case normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub id: i64,
    pub code: String,
    /// Short free-text validity marker seen next to the code (e.g. "19H").
    pub valid_time: Option<String>,
    pub source_image_url: Option<String>,
    pub processed_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Flipped to true only after a confirmed webhook delivery. Monotonic.
    pub sent: bool,
    /// Provenance bag (originating story id, capture timestamp, ...).
    pub details: Option<serde_json::Value>,
    pub origin: CouponOrigin,
    pub description: Option<String>,
    pub discount_value: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
}

/// Insertion payload for the store's dedup gate.
#[derive(Debug, Clone)]
pub struct NewCoupon {
    pub code: String,
    pub valid_time: Option<String>,
    pub source_image_url: Option<String>,
    pub details: Option<serde_json::Value>,
    pub origin: CouponOrigin,
    pub description: Option<String>,
    pub discount_value: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
}

impl NewCoupon {
    pub fn new(code: impl Into<String>, origin: CouponOrigin) -> Self {
        Self {
            code: code.into(),
            valid_time: None,
            source_image_url: None,
            details: None,
            origin,
            description: None,
            discount_value: None,
            valid_until: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_round_trips_through_as_str() {
        for origin in [
            CouponOrigin::SocialFeed,
            CouponOrigin::AggregatorSite,
            CouponOrigin::Manual,
        ] {
            assert_eq!(CouponOrigin::from_str_loose(origin.as_str()), origin);
        }
    }

    #[test]
    fn origin_loose_parse_falls_back_to_manual() {
        assert_eq!(CouponOrigin::from_str_loose("???"), CouponOrigin::Manual);
        assert_eq!(CouponOrigin::from_str_loose("Feed"), CouponOrigin::SocialFeed);
    }
}
