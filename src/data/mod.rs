//! Upstream data sources and the payloads they produce
//!
//! Each client performs its own HTTP calls and error handling and yields a
//! serializable payload; caching is the job of [`crate::cache::FetchCache`].

pub mod feeds;
pub mod market;
pub mod weather;

pub use feeds::{FeedClient, FeedError};
pub use market::{MarketClient, MarketError};
pub use weather::{WeatherClient, WeatherError};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Cache key for the weather bundle
pub const WEATHER_KEY: &str = "weather_full";
/// Cache key for the latest news headlines
pub const NEWS_KEY: &str = "news";
/// Cache key for the financial headlines
pub const FINANCE_KEY: &str = "finance";
/// Cache key for the market bundle
pub const MARKET_KEY: &str = "market_data";
/// Cache key for the potential-symbols list embedded in the market bundle
pub const STOCK_POTENTIAL_KEY: &str = "stock_potential";

/// Per-request timeout for every upstream call
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the HTTP client shared by the upstream clients
pub fn http_client() -> Client {
    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!("kioskdash/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Weather payload rendered on the weather page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherBundle {
    /// City name as reported upstream
    pub city: String,
    /// Raw current-weather document
    pub current: Value,
    /// One entry per upcoming day
    pub forecast: Vec<DailyForecast>,
    /// Raw air-pollution document
    pub air: Value,
}

/// Summary of one forecast day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    /// Calendar date, `YYYY-MM-DD`
    pub date: String,
    pub icon: String,
    pub description: String,
    pub temp_max: f64,
    pub temp_min: f64,
}

/// A headline from an RSS feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: Option<String>,
    pub link: Option<String>,
    #[serde(rename = "pubDate")]
    pub pub_date: Option<String>,
}

/// Direction of a price move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    #[serde(rename = "▲")]
    Up,
    #[serde(rename = "▼")]
    Down,
}

impl Trend {
    pub fn symbol(&self) -> &'static str {
        match self {
            Trend::Up => "▲",
            Trend::Down => "▼",
        }
    }
}

/// Latest price of a ticker and its move since the previous close
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: f64,
    pub change: Trend,
    pub percent: f64,
}

/// Quotes grouped by asset class, keyed by display name
pub type QuoteTable = BTreeMap<String, Quote>;

/// Market payload rendered on the market page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketBundle {
    pub forex: QuoteTable,
    pub stock: QuoteTable,
    pub crypto: QuoteTable,
    pub commodity: QuoteTable,
    /// Symbols flagged by the trading-signals service
    pub symbols: Vec<Value>,
    /// Last update reported by the trading-signals service
    pub updated: String,
}

impl MarketBundle {
    pub fn quote_count(&self) -> usize {
        self.forex.len() + self.stock.len() + self.crypto.len() + self.commodity.len()
    }
}

/// Response of the trading-signals service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PotentialSymbols {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub latest_updated: String,
}
