use super::request::WeatherForecastArgs;
use super::tool::parse_arguments;
use super::{LlmTool, ToolDescriptor};
use crate::error::Result;
use crate::weather::{format_forecast, resolve_date, WeatherProvider};
use async_trait::async_trait;
use chrono::Local;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub const WEATHER_FORECAST_TOOL_NAME: &str = "weather_forecast";

/// Exposes a [`WeatherProvider`] to the model.
pub struct WeatherForecastTool {
    provider: Arc<dyn WeatherProvider>,
}

impl WeatherForecastTool {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl LlmTool for WeatherForecastTool {
    async fn run(&self, args: &HashMap<String, Value>) -> Result<Value> {
        let args: WeatherForecastArgs = parse_arguments(args)?;
        let today = Local::now().date_naive();

        let date = match args.date.as_deref() {
            Some(expression) => Some(resolve_date(expression, today)?),
            None => None,
        };

        let snapshot = self.provider.forecast(&args.location, date).await?;
        let summary = format_forecast(&snapshot, args.partner_name.as_deref(), today);

        Ok(json!({
            "forecast": snapshot,
            "summary": summary,
        }))
    }

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::function::<WeatherForecastArgs>(
            WEATHER_FORECAST_TOOL_NAME,
            "Get the weather forecast for a location on a given day, from today up to 7 days ahead.",
        )
    }
}
