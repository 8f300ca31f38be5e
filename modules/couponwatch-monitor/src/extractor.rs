use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use ai_client::OpenAi;

const SYSTEM_PROMPT: &str = "You are an assistant specialized in reading merchant promo-coupon images. \
     Extract only the coupon code and, when visible, the validity hour.";

const USER_PROMPT: &str = "Analyze this coupon image and extract: \
     1) the coupon code (usually highlighted, alphanumeric characters); \
     2) the validity hour of the coupon if visible (e.g. \"19H\"). \
     Reply ONLY with a JSON object containing the keys \"codigo\" and \"horario\" \
     (null when not visible).";

const MAX_REPLY_TOKENS: u32 = 300;

static FENCED_JSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap());
static LABELED_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)codigo["\s:]+([A-Z0-9]+)"#).unwrap());
static LABELED_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)horario["\s:]+([0-9]+H)"#).unwrap());
static LOOSE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z0-9]{7,12}\b").unwrap());
static DISCOUNT_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)R\$\s*\d+(?:[.,]\d+)?|\d+(?:[.,]\d+)?\s*%").unwrap());

/// Phrases that mark a line as a discount description.
const DESCRIPTION_KEYWORDS: &[&str] = &[
    "de desconto",
    "frete grátis",
    "frete gratis",
    "cashback",
    "moedas",
];

/// Fields recovered from one coupon image.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedCoupon {
    pub code: String,
    pub valid_time: Option<String>,
    pub description: Option<String>,
    pub discount_value: Option<String>,
}

/// Outcome of an extraction attempt. Inference failures are folded into
/// `NotFound` — a bad image or a flaky upstream must never abort the tick.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Extraction {
    Found(ExtractedCoupon),
    NotFound { reason: String },
}

/// A code candidate recovered by one parser stage.
#[derive(Debug, Clone, PartialEq)]
struct CodeCandidate {
    code: String,
    valid_time: Option<String>,
}

/// Ordered fallback chain over the model's free-form reply. Each stage yields
/// a candidate only when it recovers a non-empty code; the first hit wins.
const PARSE_STAGES: &[fn(&str) -> Option<CodeCandidate>] = &[
    parse_fenced_json,
    parse_bare_json,
    parse_labeled_fields,
    parse_loose_code,
];

/// Turns one image URL into a structured coupon candidate by asking a
/// vision-capable model and defensively parsing whatever text comes back.
pub struct VisionExtractor {
    client: OpenAi,
}

impl VisionExtractor {
    pub fn new(client: OpenAi) -> Self {
        Self { client }
    }

    pub async fn extract(&self, image_url: &str) -> Extraction {
        let reply = match self
            .client
            .vision_chat(SYSTEM_PROMPT, USER_PROMPT, image_url, MAX_REPLY_TOKENS)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(image_url, error = %e, "Vision inference call failed");
                return Extraction::NotFound {
                    reason: e.to_string(),
                };
            }
        };

        debug!(image_url, reply = %reply, "Vision reply received");

        match parse_reply(&reply) {
            Some(candidate) => Extraction::Found(ExtractedCoupon {
                code: candidate.code,
                valid_time: candidate.valid_time,
                description: find_description(&reply),
                discount_value: find_discount_value(&reply),
            }),
            None => Extraction::NotFound {
                reason: "no coupon code found in model reply".to_string(),
            },
        }
    }
}

fn parse_reply(reply: &str) -> Option<CodeCandidate> {
    PARSE_STAGES.iter().find_map(|stage| stage(reply))
}

fn parse_fenced_json(reply: &str) -> Option<CodeCandidate> {
    let captures = FENCED_JSON_RE.captures(reply)?;
    let value: serde_json::Value = serde_json::from_str(captures.get(1)?.as_str()).ok()?;
    candidate_from_value(&value)
}

fn parse_bare_json(reply: &str) -> Option<CodeCandidate> {
    let value: serde_json::Value = serde_json::from_str(reply.trim()).ok()?;
    candidate_from_value(&value)
}

fn parse_labeled_fields(reply: &str) -> Option<CodeCandidate> {
    let code = LABELED_CODE_RE
        .captures(reply)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|code| !is_null_token(code))?;

    let valid_time = LABELED_TIME_RE
        .captures(reply)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    Some(CodeCandidate {
        code: code.to_string(),
        valid_time,
    })
}

fn parse_loose_code(reply: &str) -> Option<CodeCandidate> {
    LOOSE_CODE_RE.find(reply).map(|m| CodeCandidate {
        code: m.as_str().to_string(),
        valid_time: None,
    })
}

fn candidate_from_value(value: &serde_json::Value) -> Option<CodeCandidate> {
    let code = value.get("codigo")?.as_str()?.trim();
    if code.is_empty() || is_null_token(code) {
        return None;
    }

    Some(CodeCandidate {
        code: code.to_string(),
        valid_time: value
            .get("horario")
            .and_then(|h| h.as_str())
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty()),
    })
}

/// The labeled-regex stage would otherwise happily capture a literal "null".
fn is_null_token(s: &str) -> bool {
    s.eq_ignore_ascii_case("null") || s.eq_ignore_ascii_case("none")
}

/// Independent pass: first line mentioning a known discount phrase.
fn find_description(reply: &str) -> Option<String> {
    reply.lines().find_map(|line| {
        let lower = line.to_lowercase();
        DESCRIPTION_KEYWORDS
            .iter()
            .any(|kw| lower.contains(kw))
            .then(|| line.trim().to_string())
    })
}

/// Independent pass: currency amount or percentage anywhere in the reply.
fn find_discount_value(reply: &str) -> Option<String> {
    DISCOUNT_VALUE_RE
        .find(reply)
        .map(|m| m.as_str().trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_json_block_is_parsed_first() {
        let reply = "Here is the coupon:\n```json\n{\"codigo\": \"ABC123\", \"horario\": \"19H\"}\n```\nHope this helps!";
        let candidate = parse_reply(reply).unwrap();
        assert_eq!(candidate.code, "ABC123");
        assert_eq!(candidate.valid_time.as_deref(), Some("19H"));
    }

    #[test]
    fn bare_json_reply_is_parsed() {
        let reply = "{\"codigo\": \"ABC123\", \"horario\": \"19H\"}";
        let candidate = parse_reply(reply).unwrap();
        assert_eq!(candidate.code, "ABC123");
        assert_eq!(candidate.valid_time.as_deref(), Some("19H"));
    }

    #[test]
    fn labeled_text_falls_back_to_regex() {
        let reply = "The image shows codigo: XYZ9999 valid today.";
        let candidate = parse_reply(reply).unwrap();
        assert_eq!(candidate.code, "XYZ9999");
        assert_eq!(candidate.valid_time, None);
    }

    #[test]
    fn labeled_time_is_recovered_alongside_code() {
        let reply = "codigo: XYZ9999, horario: 19H";
        let candidate = parse_reply(reply).unwrap();
        assert_eq!(candidate.code, "XYZ9999");
        assert_eq!(candidate.valid_time.as_deref(), Some("19H"));
    }

    #[test]
    fn isolated_token_is_caught_by_last_resort() {
        let reply = "The code shown in the image is QWE12345.";
        let candidate = parse_reply(reply).unwrap();
        assert_eq!(candidate.code, "QWE12345");
        assert_eq!(candidate.valid_time, None);
    }

    #[test]
    fn fenced_json_wins_over_loose_tokens_elsewhere() {
        let reply = "IGNORED99 appears here.\n```json\n{\"codigo\": \"REAL123\"}\n```";
        assert_eq!(parse_reply(reply).unwrap().code, "REAL123");
    }

    #[test]
    fn json_with_null_code_falls_through() {
        // Nothing code-shaped anywhere: the JSON stages reject the null and
        // the regex stages find no uppercase run.
        let reply = "{\"codigo\": null, \"horario\": null}";
        assert_eq!(parse_reply(reply), None);
    }

    #[test]
    fn no_code_anywhere_yields_nothing() {
        assert_eq!(parse_reply("Sorry, I cannot see a coupon here."), None);
        assert_eq!(parse_reply(""), None);
    }

    #[test]
    fn short_or_overlong_runs_are_not_codes() {
        assert_eq!(parse_reply("ABC12 is too short"), None);
        assert_eq!(
            parse_reply("ABCDEFGHIJKLM0123 is longer than any real code"),
            None
        );
    }

    #[test]
    fn discount_value_currency_and_percentage() {
        assert_eq!(
            find_discount_value("R$ 20 de desconto").as_deref(),
            Some("R$ 20")
        );
        assert_eq!(
            find_discount_value("ganhe 15% em moda").as_deref(),
            Some("15%")
        );
        assert_eq!(find_discount_value("sem valores aqui"), None);
    }

    #[test]
    fn description_keyword_pass() {
        let reply = "codigo: ABC1234\nR$ 10 de desconto em eletrônicos\n";
        assert_eq!(
            find_description(reply).as_deref(),
            Some("R$ 10 de desconto em eletrônicos")
        );
        assert_eq!(find_description("nothing relevant"), None);
    }
}
