//! Tools the model can call, and the registry that validates and runs them.

pub mod partner_lookup_tool;
pub mod registry;
pub mod request;
mod tool;
pub mod weather_forecast_tool;

pub use partner_lookup_tool::{PartnerLookupTool, PARTNER_LOOKUP_TOOL_NAME};
pub use registry::{validate_arguments, ToolCall, ToolFailure, ToolRegistry};
pub use request::{PartnerLookupArgs, ToolRequest, WeatherForecastArgs};
pub use tool::{parameters_schema, parse_arguments, FunctionDescriptor, LlmTool, ToolDescriptor};
pub use weather_forecast_tool::{WeatherForecastTool, WEATHER_FORECAST_TOOL_NAME};
