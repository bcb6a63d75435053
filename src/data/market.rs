//! Market quotes from the Yahoo Finance chart API
//!
//! Fetches the last two days of hourly closes for a fixed list of forex pairs,
//! stock indices, commodities and crypto pairs, and the list of "potential"
//! stock symbols published by the trading-signals service.

use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::{http_client, MarketBundle, PotentialSymbols, Quote, QuoteTable, Trend};

/// Base URL for the Yahoo Finance chart API
const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Trading-signals endpoint listing potential stock picks
const POTENTIAL_SYMBOLS_URL: &str = "https://trading-signals-pi.vercel.app/getPotentialSymbols";

/// Display name of the Vietnamese index, which gets a second chance on daily data
const VNINDEX: &str = "VNINDEX";

/// Asset class a ticker is shown under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetClass {
    Forex,
    Stock,
    Commodity,
    Crypto,
}

/// A ticker shown on the market page
#[derive(Debug, Clone, Copy)]
pub struct Ticker {
    /// Name shown on the page
    pub name: &'static str,
    /// Yahoo Finance symbol
    pub symbol: &'static str,
    pub class: AssetClass,
}

const fn ticker(name: &'static str, symbol: &'static str, class: AssetClass) -> Ticker {
    Ticker { name, symbol, class }
}

/// Every ticker on the market page
pub const TICKERS: &[Ticker] = &[
    ticker("DXY", "DX-Y.NYB", AssetClass::Forex),
    ticker("EURUSD", "EURUSD=X", AssetClass::Forex),
    ticker("USDJPY", "JPY=X", AssetClass::Forex),
    ticker("USDCHF", "CHF=X", AssetClass::Forex),
    ticker("GBPUSD", "GBPUSD=X", AssetClass::Forex),
    ticker("AUDUSD", "AUDUSD=X", AssetClass::Forex),
    ticker("USDVND", "USDVND=X", AssetClass::Forex),
    ticker("VNINDEX", "^VNINDEX.VN", AssetClass::Stock),
    ticker("DJIA", "^DJI", AssetClass::Stock),
    ticker("NASDAQ", "^IXIC", AssetClass::Stock),
    ticker("S&P500", "^GSPC", AssetClass::Stock),
    ticker("KOSPI", "^KS11", AssetClass::Stock),
    ticker("NIKKEI", "^N225", AssetClass::Stock),
    ticker("SHANGHAI", "000001.SS", AssetClass::Stock),
    ticker("Gold", "GC=F", AssetClass::Commodity),
    ticker("Silver", "SI=F", AssetClass::Commodity),
    ticker("Brent", "BZ=F", AssetClass::Commodity),
    ticker("Crude", "CL=F", AssetClass::Commodity),
    ticker("BTCUSDT", "BTC-USD", AssetClass::Crypto),
    ticker("ETHUSDT", "ETH-USD", AssetClass::Crypto),
    ticker("XRPUSDT", "XRP-USD", AssetClass::Crypto),
    ticker("BNBUSDT", "BNB-USD", AssetClass::Crypto),
];

/// Errors that can occur when fetching market data
#[derive(Debug, Error)]
pub enum MarketError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// The upstream answered without usable prices
    #[error("No data: {0}")]
    NoData(String),
}

/// Client for the quote and trading-signals endpoints
#[derive(Debug, Clone)]
pub struct MarketClient {
    client: Client,
    chart_url: String,
    symbols_url: String,
}

impl Default for MarketClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketClient {
    pub fn new() -> Self {
        Self {
            client: http_client(),
            chart_url: YAHOO_CHART_URL.to_string(),
            symbols_url: POTENTIAL_SYMBOLS_URL.to_string(),
        }
    }

    /// Override both upstream endpoints (tests, proxies)
    pub fn with_urls(mut self, chart_url: impl Into<String>, symbols_url: impl Into<String>) -> Self {
        self.chart_url = chart_url.into();
        self.symbols_url = symbols_url.into();
        self
    }

    /// Fetch every ticker concurrently and build the market bundle
    ///
    /// Tickers that fail are logged and left out. `symbols` and `updated` are
    /// left empty for the caller to fill. Fails only when not a single quote
    /// could be obtained.
    pub async fn fetch_quotes(&self) -> Result<MarketBundle, MarketError> {
        let results = join_all(TICKERS.iter().map(|ticker| async move {
            (ticker, self.fetch_closes(ticker.symbol, "2d", "1h").await)
        }))
        .await;

        let mut bundle = MarketBundle::default();
        for (ticker, result) in results {
            match result.map(|closes| quote_from_closes(&closes)) {
                Ok(Some(quote)) => {
                    table_for(&mut bundle, ticker.class).insert(ticker.name.to_string(), quote);
                }
                Ok(None) => debug!(ticker = ticker.name, "Not enough closes for a quote"),
                Err(e) => warn!(ticker = ticker.name, error = %e, "Failed to fetch quote"),
            }
        }

        if !bundle.stock.contains_key(VNINDEX) {
            if let Some(quote) = self.vnindex_daily_fallback().await {
                bundle.stock.insert(VNINDEX.to_string(), quote);
            }
        }

        if bundle.quote_count() == 0 {
            return Err(MarketError::NoData("no ticker returned a quote".to_string()));
        }
        Ok(bundle)
    }

    /// Fetch the trading-signals list of potential stock picks
    pub async fn fetch_potential_symbols(&self) -> Result<PotentialSymbols, MarketError> {
        let response = self
            .client
            .get(&self.symbols_url)
            .send()
            .await?
            .error_for_status()?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Fetch the non-null closing prices of `symbol`
    pub async fn fetch_closes(&self, symbol: &str, range: &str, interval: &str) -> Result<Vec<f64>, MarketError> {
        let url = format!("{}/{}", self.chart_url, urlencoding::encode(symbol));
        let response = self
            .client
            .get(&url)
            .query(&[("range", range), ("interval", interval)])
            .send()
            .await?
            .error_for_status()?;
        let text = response.text().await?;
        parse_chart_closes(&text)
    }

    async fn vnindex_daily_fallback(&self) -> Option<Quote> {
        let symbol = TICKERS.iter().find(|t| t.name == VNINDEX)?.symbol;
        match self.fetch_closes(symbol, "5d", "1d").await {
            Ok(closes) => quote_from_closes(&closes),
            Err(e) => {
                warn!(error = %e, "VNINDEX daily fallback failed");
                None
            }
        }
    }
}

fn table_for(bundle: &mut MarketBundle, class: AssetClass) -> &mut QuoteTable {
    match class {
        AssetClass::Forex => &mut bundle.forex,
        AssetClass::Stock => &mut bundle.stock,
        AssetClass::Commodity => &mut bundle.commodity,
        AssetClass::Crypto => &mut bundle.crypto,
    }
}

/// Build a quote from a close series
///
/// Needs at least two closes and a non-zero previous close. Price and percent
/// are rounded to two decimals.
pub fn quote_from_closes(closes: &[f64]) -> Option<Quote> {
    let [.., prev, current] = closes else {
        return None;
    };
    if *prev == 0.0 {
        return None;
    }

    let change = if current > prev { Trend::Up } else { Trend::Down };
    Some(Quote {
        price: round2(*current),
        change,
        percent: round2((current - prev) / prev * 100.0),
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Extract non-null closes from a chart API response body
pub fn parse_chart_closes(body: &str) -> Result<Vec<f64>, MarketError> {
    let response: ChartResponse = serde_json::from_str(body)?;

    if let Some(error) = response.chart.error {
        return Err(MarketError::NoData(error.to_string()));
    }

    let closes = response
        .chart
        .result
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|result| result.indicators.quote.into_iter().next())
        .map(|quote| quote.close.into_iter().flatten().collect())
        .ok_or_else(|| MarketError::NoData("empty chart result".to_string()))?;

    Ok(closes)
}

/// Chart API response envelope
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
}
