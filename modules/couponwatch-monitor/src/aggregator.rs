// Scrapes a coupon-aggregator page for the merchant's codes. The site renders
// coupon cards with a styled-components class and reveals codes next to a
// "Pegar cupom" button; everything here tolerates partial markup.

use std::sync::LazyLock;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use reqwest::header::USER_AGENT;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use couponwatch_common::{CouponOrigin, CouponWatchError, NewCoupon};

/// The site blocks default HTTP clients; a browser-like agent is required.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const COUPON_CARD_SELECTOR: &str = ".sc-ebcb22be-2";
const REVEAL_BUTTON_LABEL: &str = "pegar cupom";

/// Posted coupons stay valid for roughly a week after publication.
const VALIDITY_DAYS_FROM_POST: i64 = 7;

static AGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)há\s+(\d+)\s+dias?").unwrap());
static AMOUNT_OFF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)R\$\s*(\d+[.,]\d+|\d+)\s+de\s+desconto").unwrap());
static CARD_CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Z0-9]{5,}").unwrap());

pub struct AggregatorScraper {
    client: reqwest::Client,
    url: String,
}

impl AggregatorScraper {
    pub fn new(url: impl Into<String>, timeout: StdDuration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            url: url.into(),
        }
    }

    /// Fetch the page and parse every coupon card. A single malformed card
    /// is skipped; only a page-level failure is an error.
    pub async fn scrape(&self, now: DateTime<Utc>) -> Result<Vec<NewCoupon>, CouponWatchError> {
        info!(url = %self.url, "Scraping aggregator site");

        let resp = self
            .client
            .get(&self.url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await
            .map_err(|e| CouponWatchError::Scraping(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CouponWatchError::Scraping(format!(
                "aggregator page returned status {status}"
            )));
        }

        let html = resp
            .text()
            .await
            .map_err(|e| CouponWatchError::Scraping(e.to_string()))?;
        Ok(parse_cards(&html, now))
    }
}

pub(crate) fn parse_cards(html: &str, now: DateTime<Utc>) -> Vec<NewCoupon> {
    let document = Html::parse_document(html);
    let card_selector = Selector::parse(COUPON_CARD_SELECTOR).unwrap();
    let title_selector = Selector::parse("h3").unwrap();
    let description_selector = Selector::parse("h3 + div").unwrap();
    let button_selector = Selector::parse("button").unwrap();

    let mut coupons = Vec::new();
    for card in document.select(&card_selector) {
        match parse_card(
            &card,
            &title_selector,
            &description_selector,
            &button_selector,
            now,
        ) {
            Some(coupon) => coupons.push(coupon),
            None => debug!("Skipping coupon card without a recognizable code"),
        }
    }

    coupons
}

fn parse_card(
    card: &ElementRef<'_>,
    title_selector: &Selector,
    description_selector: &Selector,
    button_selector: &Selector,
    now: DateTime<Utc>,
) -> Option<NewCoupon> {
    let text = card.text().collect::<Vec<_>>().join(" ");

    let title = card
        .select(title_selector)
        .next()
        .map(|e| element_text(&e))
        .filter(|t| !t.is_empty());
    let description = card
        .select(description_selector)
        .next()
        .map(|e| element_text(&e))
        .filter(|d| !d.is_empty());

    let discount_value = AMOUNT_OFF_RE
        .find(&text)
        .map(|m| m.as_str().trim().to_string());

    let code = code_near_button(card, button_selector)
        .or_else(|| CARD_CODE_RE.find(&text).map(|m| m.as_str().to_string()))?;

    let valid_until = parse_validity(AGE_RE.find(&text).map(|m| m.as_str()), now);

    let mut coupon = NewCoupon::new(code, CouponOrigin::AggregatorSite);
    coupon.description = description.or(title);
    coupon.discount_value = discount_value;
    coupon.valid_until = Some(valid_until);
    Some(coupon)
}

/// The revealed code sits in the first div following the reveal button.
fn code_near_button(card: &ElementRef<'_>, button_selector: &Selector) -> Option<String> {
    for button in card.select(button_selector) {
        let label = element_text(&button).to_lowercase();
        if !label.contains(REVEAL_BUTTON_LABEL) {
            continue;
        }

        for sibling in button.next_siblings() {
            let Some(element) = ElementRef::wrap(sibling) else {
                continue;
            };
            if element.value().name() == "div" {
                let code = element_text(&element);
                if !code.is_empty() {
                    return Some(code);
                }
            }
        }
    }

    None
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Convert a relative-age phrase ("há 3 dias") into an absolute expiry:
/// a fixed validity window anchored to the estimated post time. Without a
/// parseable age, assume one more day of validity.
pub(crate) fn parse_validity(age_text: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(age_text) = age_text else {
        return now + Duration::days(1);
    };

    match AGE_RE
        .captures(age_text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
    {
        Some(days) => now - Duration::days(days) + Duration::days(VALIDITY_DAYS_FROM_POST),
        None => now + Duration::days(1),
    }
}
