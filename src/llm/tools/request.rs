use crate::llm::models::LlmToolCall;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PartnerLookupArgs {
    /// Name of the business partner, full or partial (e.g. "Acme" or "TechVentures GmbH")
    pub partner_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WeatherForecastArgs {
    /// Location as "City, Country" (e.g. "Berlin, Germany")
    pub location: String,
    /// Day of the forecast: YYYY-MM-DD or a relative expression such as
    /// "tomorrow", "next week" or "Friday". Defaults to today.
    #[serde(default)]
    pub date: Option<String>,
    /// Business partner being visited, if the trip is for a partner visit
    #[serde(default)]
    pub partner_name: Option<String>,
}

/// A tool call the orchestrator knows how to interpret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "arguments")]
pub enum ToolRequest {
    #[serde(rename = "business_partner_lookup")]
    PartnerLookup(PartnerLookupArgs),
    #[serde(rename = "weather_forecast")]
    WeatherForecast(WeatherForecastArgs),
}

impl ToolRequest {
    /// Interpret a raw call; `None` for unknown tools or mismatched arguments.
    pub fn from_call(call: &LlmToolCall) -> Option<Self> {
        let value = serde_json::json!({
            "name": call.name,
            "arguments": call.arguments,
        });
        serde_json::from_value(value).ok()
    }

    pub fn is_partner_lookup(&self) -> bool {
        matches!(self, ToolRequest::PartnerLookup(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: serde_json::Value) -> LlmToolCall {
        LlmToolCall {
            id: Some("call_1".to_string()),
            name: name.to_string(),
            arguments: serde_json::from_value(args).unwrap(),
        }
    }

    #[test]
    fn test_partner_lookup_request() {
        let request =
            ToolRequest::from_call(&call("business_partner_lookup", json!({"partner_name": "Acme"})))
                .unwrap();

        assert!(request.is_partner_lookup());
        assert_eq!(
            request,
            ToolRequest::PartnerLookup(PartnerLookupArgs {
                partner_name: "Acme".to_string()
            })
        );
    }

    #[test]
    fn test_weather_request_without_date() {
        let request =
            ToolRequest::from_call(&call("weather_forecast", json!({"location": "Berlin, Germany"})))
                .unwrap();

        match request {
            ToolRequest::WeatherForecast(args) => {
                assert_eq!(args.location, "Berlin, Germany");
                assert!(args.date.is_none());
                assert!(args.partner_name.is_none());
            }
            other => panic!("Expected WeatherForecast, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_or_mismatched_calls() {
        assert!(ToolRequest::from_call(&call("teleport", json!({}))).is_none());
        assert!(ToolRequest::from_call(&call("business_partner_lookup", json!({"name": "x"}))).is_none());
    }
}
