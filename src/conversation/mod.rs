//! Multi-turn conversations: memory, turn events and the orchestration loop.

pub mod context_store;
pub mod events;
pub mod orchestrator;
pub mod prompt;

pub use context_store::{
    ContextStore, ContextStoreRegistry, ConversationTurn, SharedContextStore, TurnRole,
    DEFAULT_CONTEXT_WINDOW,
};
pub use events::TurnEvent;
pub use orchestrator::{
    answer_text, trip_planning_tools, ConversationOrchestrator, TurnStream,
    DEFAULT_MAX_TOOL_ROUNDS, DEFAULT_TOOL_TIMEOUT,
};
