//! The dashboard's data operations
//!
//! Each method runs one upstream client through the shared cache under its
//! fixed key. Route handlers only ever talk to this type.

use std::sync::Arc;
use tracing::warn;

use crate::cache::{CacheError, Cached, FetchCache};
use crate::data::{
    FeedClient, MarketBundle, MarketClient, NewsItem, PotentialSymbols, WeatherBundle, WeatherClient,
    FINANCE_KEY, MARKET_KEY, NEWS_KEY, STOCK_POTENTIAL_KEY, WEATHER_KEY,
};

/// Cached access to every data source on the dashboard
#[derive(Debug)]
pub struct Dashboard {
    cache: Arc<FetchCache>,
    weather: WeatherClient,
    news: FeedClient,
    finance: FeedClient,
    market: MarketClient,
}

impl Dashboard {
    pub fn new(
        cache: Arc<FetchCache>,
        weather: WeatherClient,
        news: FeedClient,
        finance: FeedClient,
        market: MarketClient,
    ) -> Self {
        Self {
            cache,
            weather,
            news,
            finance,
            market,
        }
    }

    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    pub async fn weather(&self) -> Result<Cached<WeatherBundle>, CacheError> {
        self.cache
            .get_or_fetch(WEATHER_KEY, || self.weather.fetch_bundle())
            .await
    }

    pub async fn news(&self) -> Result<Cached<Vec<NewsItem>>, CacheError> {
        self.cache.get_or_fetch(NEWS_KEY, || self.news.fetch_items()).await
    }

    pub async fn finance(&self) -> Result<Cached<Vec<NewsItem>>, CacheError> {
        self.cache
            .get_or_fetch(FINANCE_KEY, || self.finance.fetch_items())
            .await
    }

    /// Quotes plus the potential-symbols list
    ///
    /// The symbols list has its own cache entry. If it cannot be fetched and
    /// nothing is cached, the bundle carries an empty list instead of failing.
    pub async fn market(&self) -> Result<Cached<MarketBundle>, CacheError> {
        self.cache
            .get_or_fetch(MARKET_KEY, || async {
                let mut bundle = self.market.fetch_quotes().await?;
                let potential = self.potential_symbols().await;
                bundle.symbols = potential.data;
                bundle.updated = potential.latest_updated;
                Ok::<_, crate::data::MarketError>(bundle)
            })
            .await
    }

    async fn potential_symbols(&self) -> PotentialSymbols {
        match self
            .cache
            .get_or_fetch(STOCK_POTENTIAL_KEY, || self.market.fetch_potential_symbols())
            .await
        {
            Ok(cached) => cached.data,
            Err(e) => {
                warn!(error = %e, "Potential symbols unavailable, rendering without them");
                PotentialSymbols::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FileStore, Origin, DEFAULT_TTL};
    use crate::data::{Quote, Trend};
    use serde_json::json;
    use tempfile::TempDir;

    const UNREACHABLE: &str = "http://127.0.0.1:9";

    fn offline_dashboard(dir: &TempDir) -> Dashboard {
        let cache = Arc::new(FetchCache::new(
            FileStore::new(dir.path().join("cache.json")),
            DEFAULT_TTL,
        ));
        Dashboard::new(
            cache,
            WeatherClient::new("Ho Chi Minh City", Some("key".to_string())).with_base_url(UNREACHABLE),
            FeedClient::new(format!("{}/news.rss", UNREACHABLE)),
            FeedClient::new(format!("{}/finance.rss", UNREACHABLE)),
            MarketClient::new().with_urls(format!("{}/chart", UNREACHABLE), format!("{}/symbols", UNREACHABLE)),
        )
    }

    #[tokio::test]
    async fn test_news_served_from_cache() {
        let dir = TempDir::new().unwrap();
        let dashboard = offline_dashboard(&dir);
        let items = vec![NewsItem {
            title: Some("Cached headline".to_string()),
            link: Some("https://example.com".to_string()),
            pub_date: None,
        }];
        dashboard.cache().put(NEWS_KEY, &items).await.unwrap();

        let cached = dashboard.news().await.expect("Cached news should be served");

        assert_eq!(cached.origin, Origin::Hit);
        assert_eq!(cached.data, items);
    }

    #[tokio::test]
    async fn test_finance_failure_without_cache_is_an_error() {
        let dir = TempDir::new().unwrap();
        let dashboard = offline_dashboard(&dir);

        let result = dashboard.finance().await;

        assert!(matches!(result, Err(CacheError::Fetch { ref key, .. }) if key == FINANCE_KEY));
    }

    #[tokio::test]
    async fn test_market_failure_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let dashboard = offline_dashboard(&dir);

        assert!(dashboard.market().await.is_err());
        assert!(dashboard.cache().store().load().await.is_empty());
    }

    #[tokio::test]
    async fn test_market_served_from_cache() {
        let dir = TempDir::new().unwrap();
        let dashboard = offline_dashboard(&dir);
        let mut bundle = MarketBundle::default();
        bundle.crypto.insert(
            "BTCUSDT".to_string(),
            Quote {
                price: 64_000.5,
                change: Trend::Up,
                percent: 1.25,
            },
        );
        bundle.symbols = vec![json!("FPT")];
        dashboard.cache().put(MARKET_KEY, &bundle).await.unwrap();

        let cached = dashboard.market().await.expect("Cached market should be served");

        assert_eq!(cached.data, bundle);
    }

    #[tokio::test]
    async fn test_potential_symbols_degrade_to_empty() {
        let dir = TempDir::new().unwrap();
        let dashboard = offline_dashboard(&dir);

        let potential = dashboard.potential_symbols().await;

        assert_eq!(potential, PotentialSymbols::default());
        assert!(
            !dashboard.cache().store().load().await.contains_key(STOCK_POTENTIAL_KEY),
            "Degraded payload must not be cached"
        );
    }

    #[tokio::test]
    async fn test_weather_uses_its_cache_key() {
        let dir = TempDir::new().unwrap();
        let dashboard = offline_dashboard(&dir);
        let bundle = WeatherBundle {
            city: "Thành phố Hồ Chí Minh".to_string(),
            current: json!({"main": {"temp": 31.0}}),
            forecast: vec![],
            air: json!({}),
        };
        dashboard.cache().put(WEATHER_KEY, &bundle).await.unwrap();

        let cached = dashboard.weather().await.expect("Cached weather should be served");

        assert_eq!(cached.data.city, "Thành phố Hồ Chí Minh");
    }
}
