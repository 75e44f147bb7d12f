//! OpenWeatherMap forecast client.
//!
//! Resolves `"City, Country"` through the geocoding endpoint, then reads the
//! eight-day daily forecast from One Call 3.0. Days are matched in the
//! location's own time zone, so "today" means today where the partner is.

use super::{celsius_to_fahrenheit, check_horizon, WeatherProvider, WeatherSnapshot};
use crate::config::DEFAULT_WEATHER_BASE_URL;
use crate::error::{Result, TripcastError};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for connecting to the OpenWeatherMap API.
#[derive(Debug, Clone)]
pub struct OpenWeatherMapConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Option<Duration>,
}

impl OpenWeatherMapConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_WEATHER_BASE_URL.to_string(),
            timeout: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeoLocation {
    name: String,
    lat: f64,
    lon: f64,
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OneCallResponse {
    /// Seconds east of UTC at the forecast location
    #[serde(default)]
    timezone_offset: i64,
    #[serde(default)]
    daily: Vec<DailyForecast>,
}

#[derive(Debug, Deserialize)]
struct DailyForecast {
    dt: i64,
    temp: DailyTemperature,
    #[serde(default)]
    weather: Vec<ForecastCondition>,
    #[serde(default)]
    humidity: Option<u8>,
    #[serde(default)]
    wind_speed: Option<f64>,
    #[serde(default)]
    pop: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DailyTemperature {
    day: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastCondition {
    description: String,
}

pub struct OpenWeatherMapClient {
    client: Client,
    config: OpenWeatherMapConfig,
}

impl OpenWeatherMapClient {
    pub fn new(config: OpenWeatherMapConfig) -> Result<Self> {
        let mut client_builder = Client::builder();

        if let Some(timeout) = config.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder.build()?;

        Ok(Self { client, config })
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);

        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&[("appid", self.config.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TripcastError::UpstreamError("Weather API request timed out".to_string())
                } else {
                    TripcastError::UpstreamError(format!("Weather API error: {}", e))
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("OpenWeatherMap quota exhausted");
            return Err(TripcastError::UpstreamError(
                "Weather API rate limit exceeded".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(TripcastError::UpstreamError(format!(
                "Weather API error: {}",
                status.as_u16()
            )));
        }

        response.json().await.map_err(|e| {
            TripcastError::MalformedToolResult(format!("weather response is not JSON: {}", e))
        })
    }

    async fn geocode(&self, location: &str) -> Result<GeoLocation> {
        let value = self
            .get_json("/geo/1.0/direct", &[("q", location.to_string()), ("limit", "1".to_string())])
            .await?;

        let places: Vec<GeoLocation> = serde_json::from_value(value).map_err(|e| {
            TripcastError::MalformedToolResult(format!("unexpected geocoding response: {}", e))
        })?;

        places
            .into_iter()
            .next()
            .ok_or_else(|| TripcastError::UpstreamError(format!("Location '{}' not found", location)))
    }

    async fn daily_forecast(&self, place: &GeoLocation) -> Result<OneCallResponse> {
        let value = self
            .get_json(
                "/data/3.0/onecall",
                &[
                    ("lat", place.lat.to_string()),
                    ("lon", place.lon.to_string()),
                    ("units", "metric".to_string()),
                    ("exclude", "current,minutely,hourly,alerts".to_string()),
                ],
            )
            .await?;

        let response: OneCallResponse = serde_json::from_value(value).map_err(|e| {
            TripcastError::MalformedToolResult(format!("unexpected forecast response: {}", e))
        })?;

        if response.daily.is_empty() {
            return Err(TripcastError::MalformedToolResult(
                "Invalid forecast data received".to_string(),
            ));
        }

        Ok(response)
    }
}

/// Daily entry for `date` as a calendar day at the forecast location.
fn entry_for_date(
    days: &[DailyForecast],
    utc_offset_secs: i64,
    date: NaiveDate,
) -> Option<&DailyForecast> {
    days.iter().find(|day| {
        DateTime::from_timestamp(day.dt + utc_offset_secs, 0)
            .is_some_and(|local| local.date_naive() == date)
    })
}

#[async_trait]
impl WeatherProvider for OpenWeatherMapClient {
    async fn forecast(&self, location: &str, date: Option<NaiveDate>) -> Result<WeatherSnapshot> {
        let date = check_horizon(date, Local::now().date_naive())?;
        let location = location.trim();

        info!(location, %date, "Fetching OpenWeatherMap forecast");
        let place = self.geocode(location).await?;
        debug!(lat = place.lat, lon = place.lon, "Geocoded {}", place.name);

        let forecast = self.daily_forecast(&place).await?;
        let entry = entry_for_date(&forecast.daily, forecast.timezone_offset, date)
            .ok_or_else(|| {
                TripcastError::UpstreamError(format!(
                    "Weather forecast for {} is not yet available",
                    date.format("%Y-%m-%d")
                ))
            })?;

        let condition = entry
            .weather
            .first()
            .map(|w| w.description.clone())
            .ok_or_else(|| {
                TripcastError::MalformedToolResult("forecast entry has no condition".to_string())
            })?;

        let display_location = match &place.country {
            Some(country) => format!("{}, {}", place.name, country),
            None => place.name.clone(),
        };

        Ok(WeatherSnapshot {
            location: display_location,
            date,
            temperature_c: entry.temp.day.round() as i32,
            temperature_f: celsius_to_fahrenheit(entry.temp.day),
            condition,
            precipitation_probability: (entry.pop.unwrap_or(0.0) * 100.0).round().clamp(0.0, 100.0)
                as u8,
            wind_speed: entry.wind_speed,
            humidity: entry.humidity,
        })
    }
}
