use super::{LlmTool, ToolDescriptor};
use crate::error::{Result, TripcastError};
use crate::llm::models::LlmToolCall;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Structured description of a failed tool call, as handed back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl From<&TripcastError> for ToolFailure {
    fn from(error: &TripcastError) -> Self {
        let suggestions = match error {
            TripcastError::PartnerNotFound { suggestions, .. } => suggestions.clone(),
            _ => vec![],
        };
        // Upstream causes stay in the logs; the model only gets the apology.
        let message = if error.is_upstream() {
            error.user_message()
        } else {
            error.to_string()
        };
        Self {
            kind: error.kind().to_string(),
            message,
            suggestions,
        }
    }
}

/// A tool invocation together with its outcome.
///
/// Exactly one of `result` and `error` is set once the call has run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: HashMap<String, Value>,
    pub result: Option<Value>,
    pub error: Option<ToolFailure>,
}

impl ToolCall {
    pub fn succeeded(&self) -> bool {
        self.result.is_some()
    }

    /// Content of the tool message sent back to the model.
    pub fn message_content(&self) -> String {
        match (&self.result, &self.error) {
            (Some(result), _) => result.to_string(),
            (None, Some(failure)) => json!({ "error": failure }).to_string(),
            (None, None) => json!({ "error": { "kind": "internal_error", "message": "tool produced no result" } })
                .to_string(),
        }
    }
}

/// Tools offered to the model, in registration order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn LlmTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn LlmTool>) {
        self.tools.push(tool);
    }

    pub fn with_tool(mut self, tool: Arc<dyn LlmTool>) -> Self {
        self.register(tool);
        self
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn LlmTool>> {
        self.tools.iter().find(|t| t.matches(name))
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate and run one requested call, bounded by `timeout`.
    ///
    /// Never fails: errors are captured in the returned [`ToolCall`].
    pub async fn execute(&self, call: &LlmToolCall, call_id: String, timeout: Duration) -> ToolCall {
        let outcome = self.run_checked(call, timeout).await;

        let (result, error) = match outcome {
            Ok(value) => {
                info!(tool = %call.name, id = %call_id, "Tool call succeeded");
                (Some(value), None)
            }
            Err(e) => {
                warn!(tool = %call.name, id = %call_id, error = %e, "Tool call failed");
                (None, Some(ToolFailure::from(&e)))
            }
        };

        ToolCall {
            id: call_id,
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            result,
            error,
        }
    }

    async fn run_checked(&self, call: &LlmToolCall, timeout: Duration) -> Result<Value> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| TripcastError::UnknownTool(call.name.clone()))?;

        validate_arguments(&tool.descriptor().function.parameters, &call.arguments)?;
        debug!(tool = %call.name, args = ?call.arguments, "Running tool");

        match tokio::time::timeout(timeout, tool.run(&call.arguments)).await {
            Ok(result) => result,
            Err(_) => Err(TripcastError::TimeoutError(format!(
                "{} did not respond within {:?}",
                call.name, timeout
            ))),
        }
    }
}

/// Check arguments against an object schema: required keys, primitive types,
/// and unknown keys when `additionalProperties` is false.
pub fn validate_arguments(schema: &Value, args: &HashMap<String, Value>) -> Result<()> {
    let properties = schema["properties"].as_object();

    if let Some(required) = schema["required"].as_array() {
        for key in required.iter().filter_map(Value::as_str) {
            match args.get(key) {
                None | Some(Value::Null) => {
                    return Err(TripcastError::InvalidArguments(format!(
                        "missing required argument '{}'",
                        key
                    )))
                }
                _ => {}
            }
        }
    }

    for (key, value) in args {
        match properties.and_then(|p| p.get(key)) {
            Some(property) => {
                if !type_matches(&property["type"], value) {
                    return Err(TripcastError::InvalidArguments(format!(
                        "argument '{}' has the wrong type",
                        key
                    )));
                }
            }
            None if schema["additionalProperties"] == json!(false) => {
                return Err(TripcastError::InvalidArguments(format!(
                    "unexpected argument '{}'",
                    key
                )));
            }
            None => {}
        }
    }

    Ok(())
}

fn type_matches(declared: &Value, value: &Value) -> bool {
    match declared {
        Value::String(name) => primitive_matches(name, value),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .any(|name| primitive_matches(name, value)),
        // No declared type means anything goes
        _ => true,
    }
}

fn primitive_matches(name: &str, value: &Value) -> bool {
    match name {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use schemars::JsonSchema;

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct EchoArgs {
        text: String,
        times: Option<u32>,
    }

    struct EchoTool;

    #[async_trait]
    impl LlmTool for EchoTool {
        async fn run(&self, args: &HashMap<String, Value>) -> Result<Value> {
            Ok(json!({ "echo": args["text"] }))
        }

        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor::function::<EchoArgs>("echo", "Echo text")
        }
    }

    struct SlowTool;

    #[async_trait]
    impl LlmTool for SlowTool {
        async fn run(&self, _args: &HashMap<String, Value>) -> Result<Value> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(json!("late"))
        }

        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor::function::<EchoArgs>("slow", "Sleeps")
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new()
            .with_tool(Arc::new(EchoTool))
            .with_tool(Arc::new(SlowTool))
    }

    fn call(name: &str, args: Value) -> LlmToolCall {
        LlmToolCall {
            id: None,
            name: name.to_string(),
            arguments: serde_json::from_value(args).unwrap(),
        }
    }

    #[test]
    fn test_descriptors_in_registration_order() {
        let names: Vec<String> = registry()
            .descriptors()
            .into_iter()
            .map(|d| d.function.name)
            .collect();
        assert_eq!(names, vec!["echo", "slow"]);
    }

    #[tokio::test]
    async fn test_execute_success() {
        let result = registry()
            .execute(&call("echo", json!({"text": "hi"})), "c1".into(), Duration::from_secs(1))
            .await;

        assert!(result.succeeded());
        assert_eq!(result.id, "c1");
        assert_eq!(result.message_content(), r#"{"echo":"hi"}"#);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let result = registry()
            .execute(&call("teleport", json!({})), "c1".into(), Duration::from_secs(1))
            .await;

        assert_eq!(result.error.unwrap().kind, "unknown_tool");
    }

    #[tokio::test]
    async fn test_missing_required_argument() {
        let result = registry()
            .execute(&call("echo", json!({"times": 2})), "c1".into(), Duration::from_secs(1))
            .await;

        let failure = result.error.unwrap();
        assert_eq!(failure.kind, "invalid_arguments");
        assert!(failure.message.contains("'text'"));
    }

    #[tokio::test]
    async fn test_wrong_argument_type() {
        let result = registry()
            .execute(&call("echo", json!({"text": 42})), "c1".into(), Duration::from_secs(1))
            .await;

        assert_eq!(result.error.unwrap().kind, "invalid_arguments");
    }

    #[test]
    fn test_optional_accepts_null() {
        let schema = crate::llm::tools::tool::parameters_schema::<EchoArgs>();
        let args = serde_json::from_value(json!({"text": "hi", "times": null})).unwrap();
        tokio_test::assert_ok!(validate_arguments(&schema, &args));
    }

    #[test]
    fn test_additional_properties_rejected_when_closed() {
        let schema = json!({
            "type": "object",
            "properties": {"text": {"type": "string"}},
            "additionalProperties": false
        });
        let args = serde_json::from_value(json!({"text": "hi", "extra": 1})).unwrap();
        tokio_test::assert_err!(validate_arguments(&schema, &args));
    }

    #[tokio::test]
    async fn test_timeout_becomes_upstream_failure() {
        let result = registry()
            .execute(&call("slow", json!({"text": "hi"})), "c1".into(), Duration::from_millis(20))
            .await;

        let failure = result.error.unwrap();
        assert_eq!(failure.kind, "upstream_error");
        assert!(failure.message.starts_with("Sorry"));
    }

    #[test]
    fn test_failure_content_carries_suggestions() {
        let err = TripcastError::PartnerNotFound {
            query: "Tech Corp".to_string(),
            suggestions: vec!["Acme Corp".to_string()],
        };
        let tool_call = ToolCall {
            id: "c1".to_string(),
            name: "business_partner_lookup".to_string(),
            arguments: HashMap::new(),
            result: None,
            error: Some(ToolFailure::from(&err)),
        };

        let content: Value = serde_json::from_str(&tool_call.message_content()).unwrap();
        assert_eq!(content["error"]["kind"], "not_found");
        assert_eq!(content["error"]["suggestions"], json!(["Acme Corp"]));
    }
}
