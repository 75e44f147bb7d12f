//! Conversational trip planning.
//!
//! `tripcast` answers questions such as "What's the weather like for my visit
//! to Acme Corp next week?" by letting a language model call two tools: a
//! business partner directory and a weather forecast provider. Conversations
//! remember their last few turns, including which partner was discussed.
//!
//! The entry point is [`ConversationOrchestrator`], which turns an utterance
//! into an ordered stream of [`TurnEvent`]s.

pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod partners;
pub mod weather;

pub use config::AppConfig;
pub use conversation::{ConversationOrchestrator, TurnEvent};
pub use error::{Result, TripcastError};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::config::AppConfig;
    pub use crate::conversation::{
        answer_text, trip_planning_tools, ContextStore, ContextStoreRegistry,
        ConversationOrchestrator, ConversationTurn, TurnEvent,
    };
    pub use crate::error::{Result, TripcastError};
    pub use crate::llm::gateways::OpenAIGateway;
    pub use crate::llm::tools::{LlmTool, ToolDescriptor, ToolRegistry};
    pub use crate::llm::{CompletionConfig, LlmBroker, LlmGateway, LlmMessage, StreamChunk};
    pub use crate::partners::{PartnerDirectory, PartnerRecord, StaticPartnerDirectory};
    pub use crate::weather::{MockWeatherProvider, WeatherProvider, WeatherSnapshot};
}
