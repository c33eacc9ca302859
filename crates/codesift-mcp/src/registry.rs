use std::collections::HashMap;
use std::sync::Arc;

use codesift_core::tool::{ParamSchema, Tool};
use codesift_core::{CodeSiftError, Result};
use dashmap::DashMap;

/// Name → tool binding, enforcing uniqueness of tool names (spec §4.3
/// "Tool Registry").
#[derive(Default)]
pub struct ToolRegistry {
    tools: DashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(CodeSiftError::Validation(format!(
                "tool '{}' is already registered",
                name
            )));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|t| t.clone())
    }

    pub fn list_schemas(&self) -> HashMap<String, Vec<ParamSchema>> {
        self.tools
            .iter()
            .map(|e| (e.key().clone(), e.value().parameter_schema()))
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use codesift_core::types::ToolResponse;
    use serde_json::Value;

    struct NoopTool;

    #[async_trait]
    impl Tool for NoopTool {
        fn name(&self) -> &str {
            "noop"
        }
        fn parameter_schema(&self) -> Vec<ParamSchema> {
            Vec::new()
        }
        async fn execute(
            &self,
            _parameters: &HashMap<String, Value>,
            _context: &HashMap<String, Value>,
        ) -> ToolResponse {
            ToolResponse::ok("noop", Value::Null)
        }
    }

    #[test]
    fn rejects_duplicate_registration() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(NoopTool)).unwrap();
        let err = registry.register(Arc::new(NoopTool));
        assert!(err.is_err());
    }
}
