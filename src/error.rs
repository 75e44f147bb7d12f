//! Error types and result aliases for tripcast.
//!
//! [`TripcastError`] covers both infrastructure failures (HTTP, serialization,
//! configuration) and the domain taxonomy surfaced to the conversation:
//! partner not found, forecast date out of range, upstream failures and
//! malformed tool results. Tool-level errors are caught by the orchestrator and
//! handed back to the model as structured data; see [`TripcastError::kind`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TripcastError {
    #[error("LLM gateway error: {0}")]
    GatewayError(String),

    #[error("Business partner '{query}' not found")]
    PartnerNotFound { query: String, suggestions: Vec<String> },

    #[error("Date {requested} is outside the forecast range ({horizon_days} days from today)")]
    OutOfRange { requested: String, horizon_days: i64 },

    #[error("Upstream error: {0}")]
    UpstreamError(String),

    #[error("Malformed tool result: {0}")]
    MalformedToolResult(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TripcastError {
    /// Whether the failure originates in an external dependency.
    ///
    /// Malformed tool results and timeouts count as upstream failures.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            TripcastError::UpstreamError(_)
                | TripcastError::MalformedToolResult(_)
                | TripcastError::TimeoutError(_)
                | TripcastError::HttpError(_)
                | TripcastError::GatewayError(_)
        )
    }

    /// Stable machine-readable kind, used in structured tool results.
    pub fn kind(&self) -> &'static str {
        match self {
            TripcastError::PartnerNotFound { .. } => "not_found",
            TripcastError::OutOfRange { .. } => "out_of_range",
            TripcastError::InvalidArguments(_) => "invalid_arguments",
            TripcastError::UnknownTool(_) => "unknown_tool",
            e if e.is_upstream() => "upstream_error",
            _ => "internal_error",
        }
    }

    /// Short, non-technical message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            TripcastError::PartnerNotFound { query, suggestions } if suggestions.is_empty() => {
                format!(
                    "I couldn't find a business partner called '{}'. Could you check the name?",
                    query
                )
            }
            TripcastError::PartnerNotFound { query, suggestions } => format!(
                "I couldn't find a business partner called '{}'. Did you mean one of these? {}",
                query,
                suggestions.join(", ")
            ),
            TripcastError::OutOfRange { horizon_days, .. } => format!(
                "Weather forecasts are only available from today up to {} days ahead.",
                horizon_days
            ),
            TripcastError::InvalidArguments(_) | TripcastError::UnknownTool(_) => {
                "I couldn't understand that request. Could you rephrase it?".to_string()
            }
            _ => "Sorry, I'm having trouble reaching one of my services right now. Please try again in a moment.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TripcastError>;
