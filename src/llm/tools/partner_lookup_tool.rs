use super::request::PartnerLookupArgs;
use super::tool::parse_arguments;
use super::{LlmTool, ToolDescriptor};
use crate::error::Result;
use crate::partners::PartnerDirectory;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub const PARTNER_LOOKUP_TOOL_NAME: &str = "business_partner_lookup";

/// Exposes a [`PartnerDirectory`] to the model.
///
/// A miss surfaces as `PartnerNotFound` carrying up to three suggestions.
pub struct PartnerLookupTool {
    directory: Arc<dyn PartnerDirectory>,
}

impl PartnerLookupTool {
    pub fn new(directory: Arc<dyn PartnerDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl LlmTool for PartnerLookupTool {
    async fn run(&self, args: &HashMap<String, Value>) -> Result<Value> {
        let args: PartnerLookupArgs = parse_arguments(args)?;
        let partner = self.directory.lookup(&args.partner_name).await?;

        let summary = format!(
            "Found business partner: {} (ID: {}). Location: {}",
            partner.name,
            partner.id,
            partner.location()
        );

        Ok(json!({
            "found": true,
            "partner": partner,
            "summary": summary,
        }))
    }

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::function::<PartnerLookupArgs>(
            PARTNER_LOOKUP_TOOL_NAME,
            "Look up a business partner by name and return their location (city and country). \
             Use this before asking for weather at a partner's site.",
        )
    }
}
