use std::env;

use tracing::info;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Persistence
    pub database_url: String,

    // Stories listing API (RapidAPI)
    pub rapidapi_key: String,
    pub rapidapi_host: String,
    pub instagram_username: String,

    // Vision inference
    pub openai_api_key: String,
    pub openai_model: String,

    // Downstream automation
    pub webhook_url: String,

    // Aggregator site
    pub aggregator_url: String,

    // Polling policy
    pub business_timezone: String,
    pub poll_window_enabled: bool,
    pub poll_interval_minutes: u64,

    // Outbound HTTP
    pub http_timeout_secs: u64,

    // API server
    pub api_host: String,
    pub api_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://cupons.db".to_string()),
            rapidapi_key: required_env("RAPIDAPI_KEY"),
            rapidapi_host: env::var("RAPIDAPI_HOST")
                .unwrap_or_else(|_| "mediafy-api.p.rapidapi.com".to_string()),
            instagram_username: env::var("INSTAGRAM_USERNAME")
                .unwrap_or_else(|_| "shopee_br".to_string()),
            openai_api_key: required_env("OPENAI_API_KEY"),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            webhook_url: required_env("WEBHOOK_URL"),
            aggregator_url: env::var("AGGREGATOR_URL").unwrap_or_else(|_| {
                "https://promosgeniaisdaju.com.br/lojas/shopee?tab=coupons".to_string()
            }),
            business_timezone: env::var("BUSINESS_TIMEZONE")
                .unwrap_or_else(|_| "America/Sao_Paulo".to_string()),
            poll_window_enabled: env::var("POLL_WINDOW_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            poll_interval_minutes: env::var("POLL_INTERVAL_MINUTES")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .expect("POLL_INTERVAL_MINUTES must be a number"),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("HTTP_TIMEOUT_SECS must be a number"),
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port: env::var("API_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .expect("API_PORT must be a number"),
        }
    }

    /// Log the non-secret configuration at startup.
    pub fn log_redacted(&self) {
        info!(
            database_url = %self.database_url,
            rapidapi_host = %self.rapidapi_host,
            instagram_username = %self.instagram_username,
            openai_model = %self.openai_model,
            aggregator_url = %self.aggregator_url,
            business_timezone = %self.business_timezone,
            poll_window_enabled = self.poll_window_enabled,
            poll_interval_minutes = self.poll_interval_minutes,
            http_timeout_secs = self.http_timeout_secs,
            "Configuration loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
