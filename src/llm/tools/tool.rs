use crate::error::{Result, TripcastError};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

/// Descriptor for tool function parameters
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolDescriptor {
    pub r#type: String,
    pub function: FunctionDescriptor,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDescriptor {
    /// Function descriptor whose parameter schema is derived from `T`.
    pub fn function<T: JsonSchema>(name: &str, description: &str) -> Self {
        Self {
            r#type: "function".to_string(),
            function: FunctionDescriptor {
                name: name.to_string(),
                description: description.to_string(),
                parameters: parameters_schema::<T>(),
            },
        }
    }
}

/// Trait for tools the model can call
#[async_trait]
pub trait LlmTool: Send + Sync {
    /// Execute the tool with given arguments
    async fn run(&self, args: &HashMap<String, Value>) -> Result<Value>;

    /// Get tool descriptor for LLM
    fn descriptor(&self) -> ToolDescriptor;

    /// Check if this tool matches the given name
    fn matches(&self, name: &str) -> bool {
        self.descriptor().function.name == name
    }
}

/// JSON schema for a tool's arguments, without the root metadata keys.
pub fn parameters_schema<T: JsonSchema>() -> Value {
    let mut schema = serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default();
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.remove("definitions");
    }
    schema
}

/// Deserialize raw tool-call arguments into a typed argument struct.
pub fn parse_arguments<T: DeserializeOwned>(args: &HashMap<String, Value>) -> Result<T> {
    let object: serde_json::Map<String, Value> =
        args.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    serde_json::from_value(Value::Object(object))
        .map_err(|e| TripcastError::InvalidArguments(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct SampleArgs {
        /// The city to look at
        city: String,
        days: Option<u32>,
    }

    #[test]
    fn test_tool_descriptor_serialization() {
        let descriptor = ToolDescriptor::function::<SampleArgs>("sample", "A sample tool");

        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["type"], "function");
        assert_eq!(json["function"]["name"], "sample");
        assert_eq!(json["function"]["description"], "A sample tool");
    }

    #[test]
    fn test_parameters_schema_shape() {
        let schema = parameters_schema::<SampleArgs>();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["city"]["type"], "string");
        assert_eq!(schema["properties"]["city"]["description"], "The city to look at");
        assert_eq!(schema["required"], json!(["city"]));
        assert!(schema.get("$schema").is_none());
        assert!(schema.get("title").is_none());
    }

    #[test]
    fn test_parse_arguments() {
        let mut args = HashMap::new();
        args.insert("city".to_string(), json!("Berlin"));
        args.insert("days".to_string(), json!(3));

        let parsed: SampleArgs = parse_arguments(&args).unwrap();
        assert_eq!(parsed.city, "Berlin");
        assert_eq!(parsed.days, Some(3));
    }

    #[test]
    fn test_parse_arguments_missing_field() {
        let args = HashMap::new();
        let err = parse_arguments::<SampleArgs>(&args).unwrap_err();
        assert!(matches!(err, TripcastError::InvalidArguments(_)));
    }

    struct MockTool;

    #[async_trait]
    impl LlmTool for MockTool {
        async fn run(&self, _args: &HashMap<String, Value>) -> Result<Value> {
            Ok(json!("result"))
        }

        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor::function::<SampleArgs>("mock_tool", "A mock tool")
        }
    }

    #[test]
    fn test_tool_matches() {
        let tool = MockTool;
        assert!(tool.matches("mock_tool"));
        assert!(!tool.matches("other_tool"));
    }

    #[tokio::test]
    async fn test_tool_run() {
        let tool = MockTool;
        let result = tool.run(&HashMap::new()).await.unwrap();
        assert_eq!(result, json!("result"));
    }
}
