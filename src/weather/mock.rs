use super::{celsius_to_fahrenheit, check_horizon, WeatherProvider, WeatherSnapshot};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use tracing::debug;

/// Deterministic forecasts for development without an API key.
///
/// The temperature depends only on the city, so repeated calls agree.
#[derive(Debug, Clone, Default)]
pub struct MockWeatherProvider;

impl MockWeatherProvider {
    pub fn new() -> Self {
        Self
    }

    fn base_temperature(city: &str) -> i32 {
        let sum: u32 = city.to_lowercase().bytes().map(u32::from).sum();
        10 + (sum % 20) as i32
    }
}

#[async_trait]
impl WeatherProvider for MockWeatherProvider {
    async fn forecast(&self, location: &str, date: Option<NaiveDate>) -> Result<WeatherSnapshot> {
        let date = check_horizon(date, Local::now().date_naive())?;
        let location = location.trim();
        let city = location.split(',').next().unwrap_or(location).trim();
        let temperature_c = Self::base_temperature(city);

        debug!(location, %date, "Serving mock forecast");

        Ok(WeatherSnapshot {
            location: location.to_string(),
            date,
            temperature_c,
            temperature_f: celsius_to_fahrenheit(temperature_c as f64),
            condition: "partly cloudy".to_string(),
            precipitation_probability: 20,
            wind_speed: Some(15.0),
            humidity: Some(65),
        })
    }
}
