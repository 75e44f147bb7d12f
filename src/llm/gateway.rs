use crate::error::Result;
use crate::llm::models::{LlmMessage, LlmToolCall};
use crate::llm::tools::ToolDescriptor;
use futures::stream::Stream;
use std::pin::Pin;

/// Configuration for LLM completion
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub temperature: f32,
    pub max_tokens: usize,
    pub top_p: Option<f32>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 4096,
            top_p: None,
        }
    }
}

/// A piece of a streamed completion.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Incremental answer text
    Content(String),
    /// Fully assembled tool calls, emitted once per completion
    ToolCalls(Vec<LlmToolCall>),
}

pub type ChunkStream<'a> = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send + 'a>>;

/// Abstract interface for LLM providers
pub trait LlmGateway: Send + Sync {
    /// Stream an LLM completion as content chunks followed by any tool calls
    fn complete_stream<'a>(
        &'a self,
        model: &'a str,
        messages: &'a [LlmMessage],
        tools: Option<&'a [ToolDescriptor]>,
        config: &'a CompletionConfig,
    ) -> ChunkStream<'a>;
}
