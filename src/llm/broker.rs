use crate::error::{Result, TripcastError};
use crate::llm::gateway::{ChunkStream, CompletionConfig, LlmGateway};
use crate::llm::models::LlmMessage;
use crate::llm::tools::ToolDescriptor;
use futures::stream::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default wait for the next streamed chunk.
pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(60);

/// Main interface for LLM interactions
///
/// Binds a model name, completion settings and a timeout to a gateway. Tool
/// execution is left to the caller.
pub struct LlmBroker {
    model: String,
    gateway: Arc<dyn LlmGateway>,
    config: CompletionConfig,
    timeout: Duration,
}

impl LlmBroker {
    /// Create a new LLM broker
    pub fn new(model: impl Into<String>, gateway: Arc<dyn LlmGateway>) -> Self {
        Self {
            model: model.into(),
            gateway,
            config: CompletionConfig::default(),
            timeout: DEFAULT_LLM_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Stream a response as content chunks followed by any tool calls.
    ///
    /// Each chunk must arrive within the broker's timeout; otherwise the stream
    /// yields a `TimeoutError` and ends.
    pub fn generate_stream<'a>(
        &'a self,
        messages: &'a [LlmMessage],
        tools: Option<&'a [ToolDescriptor]>,
    ) -> ChunkStream<'a> {
        debug!(model = %self.model, messages = messages.len(), "Requesting streamed completion");

        Box::pin(async_stream::stream! {
            let mut stream = self.gateway.complete_stream(&self.model, messages, tools, &self.config);

            loop {
                match tokio::time::timeout(self.timeout, stream.next()).await {
                    Ok(Some(Ok(chunk))) => yield Ok(chunk),
                    Ok(Some(Err(e))) => {
                        yield Err(e);
                        return;
                    }
                    Ok(None) => return,
                    Err(_) => {
                        warn!(model = %self.model, "Streamed completion stalled");
                        yield Err(TripcastError::TimeoutError(format!(
                            "{} stopped responding for {:?}",
                            self.model, self.timeout
                        )));
                        return;
                    }
                }
            }
        })
    }
}
