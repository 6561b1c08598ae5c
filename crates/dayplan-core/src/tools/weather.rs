//! Weather forecasts via OpenWeatherMap's 5 day / 3 hour forecast API.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{ToolError, check_status, require_key};
use crate::config::WeatherConfig;

#[async_trait]
pub trait WeatherService: Send + Sync {
    /// Short human-readable forecast for `location` on `date`.
    async fn forecast(&self, location: &str, date: NaiveDate) -> Result<String, ToolError>;
}

pub struct OpenWeatherClient {
    api_key: String,
    base_url: String,
    http: Client,
    timeout: Duration,
}

impl OpenWeatherClient {
    pub fn from_config(config: &WeatherConfig) -> Result<Self, ToolError> {
        let api_key = require_key(config.api_key.as_deref(), WeatherConfig::API_KEY_ENV)?;
        let timeout = config.timeout();
        let http = Client::builder().timeout(timeout).build().map_err(ToolError::Network)?;
        Ok(Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            timeout,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    list: Vec<ForecastEntry>,
    city: Option<City>,
}

#[derive(Debug, Deserialize)]
struct City {
    name: String,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastEntry {
    /// Unix timestamp (UTC).
    dt: i64,
    main: MainReadings,
    #[serde(default)]
    weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp_min: f64,
    temp_max: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
}

impl ForecastEntry {
    fn date(&self) -> Option<NaiveDate> {
        DateTime::<Utc>::from_timestamp(self.dt, 0).map(|t| t.date_naive())
    }
}

/// Condition, temperature range and mean humidity over `entries`.
fn summarize_entries(entries: &[&ForecastEntry]) -> String {
    let min = entries.iter().map(|e| e.main.temp_min).fold(f64::INFINITY, f64::min);
    let max = entries
        .iter()
        .map(|e| e.main.temp_max)
        .fold(f64::NEG_INFINITY, f64::max);
    let humidity = entries.iter().map(|e| e.main.humidity).sum::<f64>() / entries.len() as f64;

    // Most frequent description; first seen wins ties.
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (i, desc) in entries
        .iter()
        .filter_map(|e| e.weather.first())
        .map(|c| c.description.as_str())
        .enumerate()
    {
        counts.entry(desc).or_insert((0, i)).0 += 1;
    }
    let condition = counts
        .into_iter()
        .max_by(|(_, (ca, ia)), (_, (cb, ib))| ca.cmp(cb).then(ib.cmp(ia)))
        .map(|(desc, _)| desc)
        .unwrap_or("unknown conditions");

    format!("{condition}, {min:.1}°C to {max:.1}°C, humidity {humidity:.0}%")
}

fn summarize(response: &ForecastResponse, location: &str, date: NaiveDate) -> Result<String, ToolError> {
    let place = match &response.city {
        Some(City {
            name,
            country: Some(country),
        }) => format!("{name}, {country}"),
        Some(City { name, country: None }) => name.clone(),
        None => location.to_string(),
    };

    let on_date: Vec<&ForecastEntry> = response.list.iter().filter(|e| e.date() == Some(date)).collect();
    if !on_date.is_empty() {
        return Ok(format!("Forecast for {place} on {date}: {}", summarize_entries(&on_date)));
    }

    // Outside the forecast window: use the closest day we do have.
    let nearest_date = response
        .list
        .iter()
        .filter_map(ForecastEntry::date)
        .min_by_key(|d| (*d - date).num_days().abs())
        .ok_or_else(|| ToolError::InvalidPayload("forecast contained no entries".to_string()))?;
    let nearest: Vec<&ForecastEntry> = response
        .list
        .iter()
        .filter(|e| e.date() == Some(nearest_date))
        .collect();

    Ok(format!(
        "No forecast available for {date} (outside the forecast window). \
         Nearest available forecast for {place} on {nearest_date}: {}",
        summarize_entries(&nearest)
    ))
}

#[async_trait]
impl WeatherService for OpenWeatherClient {
    async fn forecast(&self, location: &str, date: NaiveDate) -> Result<String, ToolError> {
        debug!(location, %date, "forecast: called");
        let response = self
            .http
            .get(format!("{}/data/2.5/forecast", self.base_url))
            .query(&[("q", location.trim()), ("appid", self.api_key.as_str()), ("units", "metric")])
            .send()
            .await
            .map_err(|e| ToolError::from_reqwest(e, self.timeout))?;
        let response = check_status(response).await?;

        let parsed: ForecastResponse = response
            .json()
            .await
            .map_err(|e| ToolError::InvalidPayload(e.to_string()))?;
        summarize(&parsed, location, date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{Expectation, Server, matchers::*, responders::*};

    // 2026-10-17 00:00:00 UTC
    const OCT_17: i64 = 1_792_195_200;
    const HOURS_3: i64 = 3 * 3600;

    fn entry(dt: i64, min: f64, max: f64, humidity: f64, desc: &str) -> serde_json::Value {
        serde_json::json!({
            "dt": dt,
            "main": { "temp": (min + max) / 2.0, "temp_min": min, "temp_max": max, "humidity": humidity },
            "weather": [{ "main": "x", "description": desc }]
        })
    }

    fn forecast_body() -> serde_json::Value {
        serde_json::json!({
            "city": { "name": "Visakhapatnam", "country": "IN" },
            "list": [
                entry(OCT_17 + 3 * HOURS_3, 26.0, 29.5, 80.0, "light rain"),
                entry(OCT_17 + 4 * HOURS_3, 27.0, 30.5, 70.0, "light rain"),
                entry(OCT_17 + 5 * HOURS_3, 25.5, 28.0, 75.0, "overcast clouds"),
                entry(OCT_17 + 8 * HOURS_3, 24.0, 26.0, 85.0, "clear sky"),
            ]
        })
    }

    fn client_for(server: &Server) -> OpenWeatherClient {
        let config = WeatherConfig {
            base_url: server.url_str(""),
            api_key: Some("owm-test".to_string()),
            ..WeatherConfig::default()
        };
        OpenWeatherClient::from_config(&config).unwrap()
    }

    fn oct(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, day).unwrap()
    }

    #[tokio::test]
    async fn forecast_summarizes_requested_day() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/data/2.5/forecast"),
                request::query(url_decoded(contains(("q", "Vizag")))),
                request::query(url_decoded(contains(("appid", "owm-test")))),
                request::query(url_decoded(contains(("units", "metric")))),
            ])
            .respond_with(json_encoded(forecast_body())),
        );

        let text = client_for(&server).forecast("Vizag", oct(17)).await.unwrap();
        assert_eq!(
            text,
            "Forecast for Visakhapatnam, IN on 2026-10-17: light rain, 25.5°C to 30.5°C, humidity 75%"
        );
    }

    #[tokio::test]
    async fn forecast_outside_window_uses_nearest_day() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/data/2.5/forecast"))
                .respond_with(json_encoded(forecast_body())),
        );

        let text = client_for(&server).forecast("Vizag", oct(30)).await.unwrap();
        assert!(text.starts_with("No forecast available for 2026-10-30"), "got: {text}");
        assert!(text.contains("on 2026-10-18: clear sky"), "got: {text}");
    }

    #[tokio::test]
    async fn unknown_city_is_http_error() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/data/2.5/forecast"))
                .respond_with(status_code(404).body(r#"{"cod":"404","message":"city not found"}"#)),
        );

        let err = client_for(&server).forecast("Nowhere", oct(17)).await.unwrap_err();
        assert!(matches!(err, ToolError::Http { status: 404, .. }));
    }

    #[test]
    fn empty_list_is_invalid_payload() {
        let response = ForecastResponse {
            list: vec![],
            city: None,
        };
        assert!(matches!(
            summarize(&response, "Vizag", oct(17)),
            Err(ToolError::InvalidPayload(_))
        ));
    }
}
