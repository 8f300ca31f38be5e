use thiserror::Error;

#[derive(Error, Debug)]
pub enum CouponWatchError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Scraping error: {0}")]
    Scraping(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
