//! Partner lookup delegated to a remote tool server.
//!
//! The server speaks JSON-RPC 2.0 and exposes the lookup as a callable tool
//! (`tools/call`). Results are accepted either as `structuredContent` or as a
//! JSON document in the first text content block, and must carry a partner
//! record (`{"partner": {...}}` or the record itself).

use super::{PartnerDirectory, PartnerRecord};
use crate::config::DEFAULT_PARTNER_TOOL_NAME;
use crate::error::{Result, TripcastError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Configuration for connecting to a remote partner tool server.
#[derive(Debug, Clone)]
pub struct RemoteDirectoryConfig {
    pub url: String,
    pub tool_name: String,
    pub timeout: Option<Duration>,
}

impl RemoteDirectoryConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tool_name: DEFAULT_PARTNER_TOOL_NAME.to_string(),
            timeout: None,
        }
    }
}

pub struct RemotePartnerDirectory {
    client: Client,
    config: RemoteDirectoryConfig,
}

impl RemotePartnerDirectory {
    pub fn new(config: RemoteDirectoryConfig) -> Result<Self> {
        let mut client_builder = Client::builder();

        if let Some(timeout) = config.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder.build()?;

        Ok(Self { client, config })
    }

    async fn call_tool(&self, query_name: &str) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": Uuid::new_v4().to_string(),
            "method": "tools/call",
            "params": {
                "name": self.config.tool_name,
                "arguments": { "partner_name": query_name }
            }
        });

        let response = self
            .client
            .post(&self.config.url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| TripcastError::UpstreamError(format!("partner tool server: {}", e)))?;

        if !response.status().is_success() {
            return Err(TripcastError::UpstreamError(format!(
                "partner tool server returned {}",
                response.status()
            )));
        }

        let envelope: Value = response.json().await.map_err(|e| {
            TripcastError::MalformedToolResult(format!("partner tool response is not JSON: {}", e))
        })?;

        if let Some(error) = envelope.get("error") {
            let message = error["message"].as_str().unwrap_or("unknown error");
            return Err(TripcastError::UpstreamError(format!(
                "partner tool server error: {}",
                message
            )));
        }

        envelope.get("result").cloned().ok_or_else(|| {
            TripcastError::MalformedToolResult("response has neither result nor error".to_string())
        })
    }
}

/// Extract the partner payload from a `tools/call` result.
///
/// Returns `Ok(None)` when the tool reports that nothing matched.
fn extract_partner(result: &Value) -> Result<(Option<PartnerRecord>, Vec<String>)> {
    let payload = match result.get("structuredContent").filter(|v| !v.is_null()) {
        Some(structured) => structured.clone(),
        None => {
            let text = result["content"]
                .as_array()
                .and_then(|blocks| blocks.iter().find(|b| b["type"] == "text"))
                .and_then(|b| b["text"].as_str())
                .ok_or_else(|| {
                    TripcastError::MalformedToolResult("result has no text content".to_string())
                })?;
            serde_json::from_str(text).map_err(|e| {
                TripcastError::MalformedToolResult(format!("text content is not JSON: {}", e))
            })?
        }
    };

    let suggestions = payload["suggestions"]
        .as_array()
        .map(|items| items.iter().filter_map(|s| s.as_str().map(String::from)).collect())
        .unwrap_or_default();

    if result["isError"].as_bool().unwrap_or(false) || payload["found"] == json!(false) {
        return Ok((None, suggestions));
    }

    let record_value = payload.get("partner").unwrap_or(&payload);
    if record_value.is_null() {
        return Ok((None, suggestions));
    }

    let record: PartnerRecord = serde_json::from_value(record_value.clone()).map_err(|e| {
        TripcastError::MalformedToolResult(format!("partner record does not match schema: {}", e))
    })?;

    Ok((Some(record), suggestions))
}

#[async_trait]
impl PartnerDirectory for RemotePartnerDirectory {
    async fn lookup(&self, query_name: &str) -> Result<PartnerRecord> {
        let query = query_name.trim();
        if query.is_empty() {
            return Err(TripcastError::PartnerNotFound {
                query: String::new(),
                suggestions: vec![],
            });
        }

        info!(tool = %self.config.tool_name, "Delegating partner lookup to remote tool server");
        let result = self.call_tool(query).await?;
        debug!("Partner tool result: {}", result);

        match extract_partner(&result) {
            Ok((Some(record), _)) => Ok(record),
            Ok((None, suggestions)) => Err(TripcastError::PartnerNotFound {
                query: query.to_string(),
                suggestions,
            }),
            Err(e) => {
                warn!(error = %e, "Remote partner lookup returned unusable data");
                Err(e)
            }
        }
    }
}
