use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::ToolResponse;

/// A single declared parameter of a tool, used to render `GET
/// /api/v1/mcp/tools` schemas (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSchema {
    pub name: String,
    pub param_type: String,
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
}

/// A named, parameterized unit of work producing a structured response
/// (spec GLOSSARY, "Tool"). Modeled as a name→capability binding so the
/// registry can dispatch dynamically instead of hard-coding a match arm per
/// tool name.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn parameter_schema(&self) -> Vec<ParamSchema>;
    async fn execute(
        &self,
        parameters: &HashMap<String, Value>,
        context: &HashMap<String, Value>,
    ) -> ToolResponse;
}
