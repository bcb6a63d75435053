//! OpenWeather API client
//!
//! Builds the weather bundle from three calls: current weather by city name,
//! then the 5-day / 3-hour forecast and the air-pollution index for the
//! coordinates the first call returns.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::{http_client, DailyForecast, WeatherBundle};

/// Base URL for the OpenWeather 2.5 API
const OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// Number of forecast days kept in the bundle
const FORECAST_DAYS: usize = 6;

/// Errors that can occur when fetching weather data
#[derive(Debug, Error)]
pub enum WeatherError {
    /// No API key was configured
    #[error("OpenWeather API key is not configured")]
    MissingApiKey,

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Missing expected field in response
    #[error("Missing expected field in response: {0}")]
    MissingField(String),
}

/// Client for fetching weather data from OpenWeather
#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    city: String,
    lang: String,
}

impl WeatherClient {
    /// Create a new WeatherClient for `city`
    pub fn new(city: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: http_client(),
            base_url: OPENWEATHER_BASE_URL.to_string(),
            api_key,
            city: city.into(),
            lang: "vi".to_string(),
        }
    }

    /// Use a different language for weather descriptions
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    /// Point the client at another API root (tests, proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch current conditions, the daily forecast and air quality
    pub async fn fetch_bundle(&self) -> Result<WeatherBundle, WeatherError> {
        let api_key = self.api_key.as_deref().ok_or(WeatherError::MissingApiKey)?;

        let current: Value = self
            .get_json(
                "weather",
                &[
                    ("q", self.city.as_str()),
                    ("appid", api_key),
                    ("units", "metric"),
                    ("lang", self.lang.as_str()),
                ],
            )
            .await?;

        let city = current
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.city)
            .to_string();
        let (lat, lon) = coordinates(&current)?;
        let (lat, lon) = (lat.to_string(), lon.to_string());

        let forecast: ForecastResponse = self
            .get_json(
                "forecast",
                &[
                    ("lat", lat.as_str()),
                    ("lon", lon.as_str()),
                    ("appid", api_key),
                    ("units", "metric"),
                    ("lang", self.lang.as_str()),
                ],
            )
            .await?;

        let air: Value = self
            .get_json(
                "air_pollution",
                &[("lat", lat.as_str()), ("lon", lon.as_str()), ("appid", api_key)],
            )
            .await?;

        Ok(WeatherBundle {
            city,
            current,
            forecast: daily_forecast(&forecast.list, FORECAST_DAYS),
            air,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T, WeatherError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self.client.get(&url).query(query).send().await?.error_for_status()?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Extract `coord.lat` / `coord.lon` from a current-weather document
fn coordinates(current: &Value) -> Result<(f64, f64), WeatherError> {
    let coord = current
        .get("coord")
        .ok_or_else(|| WeatherError::MissingField("coord".to_string()))?;
    let lat = coord
        .get("lat")
        .and_then(Value::as_f64)
        .ok_or_else(|| WeatherError::MissingField("coord.lat".to_string()))?;
    let lon = coord
        .get("lon")
        .and_then(Value::as_f64)
        .ok_or_else(|| WeatherError::MissingField("coord.lon".to_string()))?;
    Ok((lat, lon))
}

/// Collapse 3-hourly forecast samples into per-day summaries
///
/// Days keep the order in which they first appear. Each day reports the
/// extreme temperatures of its samples and the icon and description of the
/// sample in the middle of the day's list.
pub fn daily_forecast(samples: &[ForecastSample], days: usize) -> Vec<DailyForecast> {
    let mut grouped: Vec<(&str, Vec<&ForecastSample>)> = Vec::new();
    for sample in samples {
        let day = sample.dt_txt.split(' ').next().unwrap_or_default();
        match grouped.iter_mut().find(|(d, _)| *d == day) {
            Some((_, items)) => items.push(sample),
            None => grouped.push((day, vec![sample])),
        }
    }

    grouped
        .into_iter()
        .take(days)
        .map(|(day, items)| {
            let temp_max = items.iter().map(|s| s.main.temp).fold(f64::NEG_INFINITY, f64::max);
            let temp_min = items.iter().map(|s| s.main.temp).fold(f64::INFINITY, f64::min);
            let midday = items[items.len() / 2].weather.first();
            DailyForecast {
                date: day.to_string(),
                icon: midday.map(|w| w.icon.clone()).unwrap_or_default(),
                description: midday.map(|w| w.description.clone()).unwrap_or_default(),
                temp_max,
                temp_min,
            }
        })
        .collect()
}

/// 5-day / 3-hour forecast response
#[derive(Debug, Deserialize)]
struct ForecastResponse {
    list: Vec<ForecastSample>,
}

/// One 3-hour forecast sample
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastSample {
    /// Sample time, `YYYY-MM-DD HH:MM:SS`
    pub dt_txt: String,
    pub main: SampleMain,
    #[serde(default)]
    pub weather: Vec<SampleCondition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SampleMain {
    pub temp: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SampleCondition {
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub description: String,
}
