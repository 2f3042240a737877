use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ScrapeError;

pub const PRICE_NOT_FOUND: &str = "Price not found";

#[derive(Debug, Clone, PartialEq)]
pub enum PriceQuote {
    /// Price text exactly as found on the page.
    Text(String),
    /// Mean of the first few listing prices. `mean` is 0.0 when nothing matched.
    Average { mean: f64, samples: Vec<String> },
    NotFound,
}

impl PriceQuote {
    pub fn is_found(&self) -> bool {
        match self {
            PriceQuote::Text(_) => true,
            PriceQuote::Average { samples, .. } => !samples.is_empty(),
            PriceQuote::NotFound => false,
        }
    }
}

impl fmt::Display for PriceQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceQuote::Text(text) => f.write_str(text),
            PriceQuote::Average { mean, .. } => write!(f, "${:.2}", mean),
            PriceQuote::NotFound => f.write_str(PRICE_NOT_FOUND),
        }
    }
}

/// One row of the `price_history` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadRecord {
    pub item_name: String,
    pub product_url: Option<String>,
    pub price: String,
    pub scraped_at: String,
}

impl UploadRecord {
    pub fn new(item_name: &str, product_url: Option<&str>, quote: &PriceQuote) -> Self {
        UploadRecord {
            item_name: item_name.to_string(),
            product_url: product_url.map(str::to_string),
            price: quote.to_string(),
            scraped_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkOutcome {
    Uploaded,
    Skipped,
    Failed,
}

#[derive(Debug)]
pub struct Scraped {
    pub product_url: Option<String>,
    pub quote: PriceQuote,
    pub sink: SinkOutcome,
}

#[derive(Debug)]
pub struct ItemReport {
    pub item: String,
    pub outcome: Result<Scraped, ScrapeError>,
}

impl ItemReport {
    pub fn price_found(&self) -> bool {
        matches!(&self.outcome, Ok(scraped) if scraped.quote.is_found())
    }
}
