//! OpenAI Gateway for LLM interactions.
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint as a
//! server-sent event stream. Tool calls arrive in fragments and are assembled
//! before being emitted.

use crate::error::{Result, TripcastError};
use crate::llm::gateway::{ChunkStream, CompletionConfig, LlmGateway, StreamChunk};
use crate::llm::gateways::openai_messages_adapter::{adapt_messages_to_openai, parse_arguments_string};
use crate::llm::models::{LlmMessage, LlmToolCall};
use crate::llm::tools::ToolDescriptor;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Configuration for connecting to OpenAI API.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Option<std::time::Duration>,
}

/// Gateway for OpenAI LLM service.
pub struct OpenAIGateway {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIGateway {
    /// Create a new OpenAI gateway with custom configuration.
    pub fn with_config(config: OpenAIConfig) -> Result<Self> {
        let mut client_builder = Client::builder();

        if let Some(timeout) = config.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder.build()?;

        Ok(Self { client, config })
    }

    fn request_body(
        model: &str,
        messages: &[LlmMessage],
        tools: Option<&[ToolDescriptor]>,
        config: &CompletionConfig,
    ) -> Result<Value> {
        let mut body = json!({
            "model": model,
            "messages": adapt_messages_to_openai(messages),
            "temperature": config.temperature,
            "max_tokens": config.max_tokens,
            "stream": true,
        });

        if let Some(top_p) = config.top_p {
            body["top_p"] = json!(top_p);
        }

        if let Some(tools) = tools.filter(|t| !t.is_empty()) {
            body["tools"] = serde_json::to_value(tools)?;
        }

        Ok(body)
    }

    async fn post_completion(&self, body: &Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(TripcastError::GatewayError(format!(
                "OpenAI API error: {} - {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

impl LlmGateway for OpenAIGateway {
    fn complete_stream<'a>(
        &'a self,
        model: &'a str,
        messages: &'a [LlmMessage],
        tools: Option<&'a [ToolDescriptor]>,
        config: &'a CompletionConfig,
    ) -> ChunkStream<'a> {
        Box::pin(async_stream::stream! {
            info!("Starting OpenAI streaming completion");
            debug!("Model: {}, Message count: {}", model, messages.len());

            let body = match Self::request_body(model, messages, tools, config) {
                Ok(body) => body,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let response = match self.post_completion(&body).await {
                Ok(r) => r,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let mut bytes = response.bytes_stream();
            let mut parser = SseParser::default();

            while let Some(chunk_result) = bytes.next().await {
                match chunk_result {
                    Ok(data) => {
                        for chunk in parser.feed(&data) {
                            yield Ok(chunk);
                        }
                    }
                    Err(e) => {
                        yield Err(e.into());
                        return;
                    }
                }
            }

            // Servers that close without [DONE] still owe us their tool calls
            for chunk in parser.finish() {
                yield Ok(chunk);
            }
        })
    }
}

/// Accumulator for streaming tool calls.
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Incremental parser for the chat completion event stream.
#[derive(Debug, Default)]
struct SseParser {
    buffer: Vec<u8>,
    tool_calls: BTreeMap<usize, ToolCallAccumulator>,
}

impl SseParser {
    /// Consume raw bytes and return the chunks completed by them.
    fn feed(&mut self, bytes: &[u8]) -> Vec<StreamChunk> {
        self.buffer.extend_from_slice(bytes);
        let mut chunks = Vec::new();

        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&line);
            let Some(data) = line.trim().strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();

            if data == "[DONE]" {
                chunks.extend(self.finish());
                continue;
            }

            match serde_json::from_str::<Value>(data) {
                Ok(event) => self.handle_event(&event, &mut chunks),
                Err(e) => warn!("Failed to parse streaming chunk: {}", e),
            }
        }

        chunks
    }

    fn handle_event(&mut self, event: &Value, chunks: &mut Vec<StreamChunk>) {
        let Some(choice) = event["choices"].as_array().and_then(|c| c.first()) else {
            return;
        };
        let delta = &choice["delta"];

        if let Some(content) = delta["content"].as_str().filter(|c| !c.is_empty()) {
            chunks.push(StreamChunk::Content(content.to_string()));
        }

        for fragment in delta["tool_calls"].as_array().into_iter().flatten() {
            let Some(index) = fragment["index"].as_u64() else {
                continue;
            };
            let acc = self.tool_calls.entry(index as usize).or_default();

            if let Some(id) = fragment["id"].as_str() {
                acc.id = Some(id.to_string());
            }
            if let Some(name) = fragment["function"]["name"].as_str() {
                acc.name = Some(name.to_string());
            }
            if let Some(args) = fragment["function"]["arguments"].as_str() {
                acc.arguments.push_str(args);
            }
        }

        if choice["finish_reason"].as_str() == Some("tool_calls") {
            chunks.extend(self.finish());
        }
    }

    /// Emit any accumulated tool calls, in index order.
    fn finish(&mut self) -> Vec<StreamChunk> {
        let calls: Vec<LlmToolCall> = std::mem::take(&mut self.tool_calls)
            .into_values()
            .filter_map(|acc| {
                Some(LlmToolCall {
                    name: acc.name?,
                    id: acc.id,
                    arguments: parse_arguments_string(&acc.arguments),
                })
            })
            .collect();

        if calls.is_empty() {
            vec![]
        } else {
            vec![StreamChunk::ToolCalls(calls)]
        }
    }
}
