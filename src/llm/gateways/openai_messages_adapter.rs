//! Adapter for converting LLM messages to the OpenAI chat format.

use crate::llm::models::{LlmMessage, LlmToolCall, MessageRole};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Adapt LLM messages to OpenAI format.
pub fn adapt_messages_to_openai(messages: &[LlmMessage]) -> Vec<Value> {
    messages.iter().map(adapt_message).collect()
}

fn adapt_message(msg: &LlmMessage) -> Value {
    match msg.role {
        MessageRole::System => json!({
            "role": "system",
            "content": msg.content.as_deref().unwrap_or("")
        }),
        MessageRole::User => json!({
            "role": "user",
            "content": msg.content.as_deref().unwrap_or("")
        }),
        MessageRole::Assistant => {
            let mut assistant_msg = json!({ "role": "assistant" });

            if let Some(ref content) = msg.content {
                assistant_msg["content"] = json!(content);
            }

            if let Some(ref tool_calls) = msg.tool_calls {
                let formatted_calls: Vec<Value> = tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id.as_deref().unwrap_or(""),
                            "type": "function",
                            "function": {
                                "name": tc.name,
                                "arguments": Value::Object(tc.arguments.clone().into_iter().collect()).to_string()
                            }
                        })
                    })
                    .collect();
                assistant_msg["tool_calls"] = json!(formatted_calls);
            }

            assistant_msg
        }
        MessageRole::Tool => {
            // The answered call travels as the first (only) tool call
            let tool_call_id = msg
                .tool_calls
                .as_ref()
                .and_then(|tcs| tcs.first())
                .and_then(|tc| tc.id.clone())
                .unwrap_or_default();

            json!({
                "role": "tool",
                "content": msg.content.as_deref().unwrap_or(""),
                "tool_call_id": tool_call_id
            })
        }
    }
}

/// Arguments arrive as a JSON-encoded string; anything but an object is
/// treated as no arguments, leaving validation to the tool registry.
pub fn parse_arguments_string(raw: &str) -> HashMap<String, Value> {
    serde_json::from_str(raw).unwrap_or_default()
}
