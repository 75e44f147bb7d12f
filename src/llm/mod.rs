//! Model access: the gateway abstraction, the OpenAI-compatible gateway, the
//! broker that applies model settings and timeouts, and the callable tools.

pub mod broker;
pub mod gateway;
pub mod gateways;
pub mod models;
pub mod tools;

pub use broker::LlmBroker;
pub use gateway::{ChunkStream, CompletionConfig, LlmGateway, StreamChunk};
pub use models::{LlmMessage, LlmToolCall, MessageRole};
pub use tools::{FunctionDescriptor, LlmTool, ToolDescriptor, ToolRegistry};
