use std::time::Duration;

use serde::Serialize;
use tracing::{error, info};

use couponwatch_common::Coupon;

/// Wire contract of the downstream automation webhook. Field names are the
/// literal keys the receiver matches on.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    codigo: &'a str,
    horario: &'a str,
    imagem_url: &'a str,
}

/// Posts newly discovered coupons to the downstream automation endpoint.
/// One attempt per call; retry policy belongs to the orchestrator.
pub struct WebhookForwarder {
    client: reqwest::Client,
    url: String,
}

impl WebhookForwarder {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            url: url.into(),
        }
    }

    /// Deliver one coupon. Any 2xx is an ack; everything else is a logged
    /// failure that leaves the coupon pending.
    pub async fn deliver(&self, coupon: &Coupon) -> bool {
        let payload = WebhookPayload {
            codigo: &coupon.code,
            horario: coupon.valid_time.as_deref().unwrap_or(""),
            imagem_url: coupon.source_image_url.as_deref().unwrap_or(""),
        };

        info!(code = %coupon.code, "Sending coupon to webhook");

        match self.client.post(&self.url).json(&payload).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    info!(code = %coupon.code, status = status.as_u16(), "Webhook acknowledged coupon");
                    true
                } else {
                    let body = resp.text().await.unwrap_or_default();
                    error!(
                        code = %coupon.code,
                        status = status.as_u16(),
                        body = %body,
                        "Webhook rejected coupon"
                    );
                    false
                }
            }
            Err(e) => {
                error!(code = %coupon.code, error = %e, "Webhook request failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_uses_the_literal_wire_field_names() {
        let payload = WebhookPayload {
            codigo: "ABC123",
            horario: "19H",
            imagem_url: "https://cdn.example/a.jpg",
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["codigo"], "ABC123");
        assert_eq!(json["horario"], "19H");
        assert_eq!(json["imagem_url"], "https://cdn.example/a.jpg");
    }
}
