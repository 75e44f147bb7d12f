//! Weather forecasts.
//!
//! [`WeatherProvider`] is the boundary to the forecast source. The
//! [`OpenWeatherMapClient`] talks to the real HTTP API; the
//! [`MockWeatherProvider`] returns deterministic data and is used when no API
//! key is configured.

pub mod dates;
pub mod format;
pub mod mock;
pub mod openweathermap;

use crate::error::{Result, TripcastError};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

pub use dates::resolve_date;
pub use format::format_forecast;
pub use mock::MockWeatherProvider;
pub use openweathermap::{OpenWeatherMapClient, OpenWeatherMapConfig};

/// Forecasts are served from today up to this many days ahead, inclusive.
pub const FORECAST_HORIZON_DAYS: i64 = 7;

/// A forecast for one location and day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location: String,
    pub date: NaiveDate,
    pub temperature_c: i32,
    pub temperature_f: i32,
    pub condition: String,
    /// Chance of precipitation, 0-100.
    pub precipitation_probability: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<u8>,
}

/// Source of forecasts.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Forecast for `location` on `date` (today when `None`).
    async fn forecast(&self, location: &str, date: Option<NaiveDate>) -> Result<WeatherSnapshot>;
}

/// Resolve an optional date against the supported forecast horizon.
pub fn check_horizon(date: Option<NaiveDate>, today: NaiveDate) -> Result<NaiveDate> {
    let date = date.unwrap_or(today);
    if date < today || date > today + Duration::days(FORECAST_HORIZON_DAYS) {
        return Err(TripcastError::OutOfRange {
            requested: date.format("%Y-%m-%d").to_string(),
            horizon_days: FORECAST_HORIZON_DAYS,
        });
    }
    Ok(date)
}

pub fn celsius_to_fahrenheit(celsius: f64) -> i32 {
    (celsius * 9.0 / 5.0 + 32.0).round() as i32
}
