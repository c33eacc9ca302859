use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use codesift_configimpact::{self as configimpact};
use codesift_core::config::{ConfigImpactConfig, CrossRepoConfig};
use codesift_core::tool::{ParamSchema, Tool};
use codesift_core::types::ErrorCategory;
use codesift_core::types::ToolResponse;
use codesift_crossrepo::{self as crossrepo, SearchRequest};
use codesift_vector::VectorStore;
use serde_json::{json, Value};

fn param_str(parameters: &HashMap<String, Value>, key: &str) -> Option<String> {
    parameters.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn param_usize(parameters: &HashMap<String, Value>, key: &str, default: usize) -> usize {
    parameters
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .unwrap_or(default)
}

fn param_bool(parameters: &HashMap<String, Value>, key: &str, default: bool) -> bool {
    parameters.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

/// Embeds the query and returns the top-k most similar snippets across
/// every namespace (spec §4.2, "Always insert `vector_search` first").
pub struct VectorSearchTool {
    store: Arc<VectorStore>,
}

impl VectorSearchTool {
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for VectorSearchTool {
    fn name(&self) -> &str {
        "vector_search"
    }

    fn parameter_schema(&self) -> Vec<ParamSchema> {
        vec![
            ParamSchema {
                name: "query".into(),
                param_type: "string".into(),
                required: true,
                default: None,
            },
            ParamSchema {
                name: "limit".into(),
                param_type: "number".into(),
                required: false,
                default: Some(json!(10)),
            },
        ]
    }

    async fn execute(
        &self,
        parameters: &HashMap<String, Value>,
        _context: &HashMap<String, Value>,
    ) -> ToolResponse {
        let Some(query) = param_str(parameters, "query") else {
            return ToolResponse::failed("missing required parameter 'query'", ErrorCategory::InvalidParameters);
        };
        let limit = param_usize(parameters, "limit", 10);

        if self.store.is_degraded() {
            return ToolResponse::ok(
                "vector store is degraded; skipping embedding generation",
                json!({ "results": [] }),
            );
        }

        let vector = match self.store.generate_embedding(&query).await {
            Ok(v) => v,
            Err(e) => return ToolResponse::failed(format!("embedding generation failed: {}", e), ErrorCategory::ExecutionError),
        };

        let hits = self.store.find_similar_all_namespaces(&vector, limit, 0.0);
        let results: Vec<Value> = hits
            .into_iter()
            .map(|(namespace, id, similarity, metadata)| {
                json!({
                    "namespace": namespace,
                    "id": id,
                    "similarity": similarity,
                    "file_path": metadata.file_path,
                    "start_line": metadata.start_line,
                    "end_line": metadata.end_line,
                    "content": metadata.content,
                })
            })
            .collect();

        ToolResponse::ok("vector search completed", json!({ "results": results }))
    }
}

/// Finds every reference to a property name across the configured source
/// roots and scores the blast radius (spec §4.8).
pub struct ConfigImpactAnalyzerTool {
    config: ConfigImpactConfig,
    source_roots: Vec<String>,
}

impl ConfigImpactAnalyzerTool {
    pub fn new(config: ConfigImpactConfig, source_roots: Vec<String>) -> Self {
        Self { config, source_roots }
    }
}

#[async_trait]
impl Tool for ConfigImpactAnalyzerTool {
    fn name(&self) -> &str {
        "config_impact_analyzer"
    }

    fn parameter_schema(&self) -> Vec<ParamSchema> {
        vec![ParamSchema {
            name: "property_name".into(),
            param_type: "string".into(),
            required: true,
            default: None,
        }]
    }

    async fn execute(
        &self,
        parameters: &HashMap<String, Value>,
        _context: &HashMap<String, Value>,
    ) -> ToolResponse {
        let Some(property_name) = param_str(parameters, "property_name") else {
            return ToolResponse::failed(
                "missing required parameter 'property_name'",
                ErrorCategory::InvalidParameters,
            );
        };

        let report = tokio::task::block_in_place(|| {
            configimpact::analyze(&self.config, &self.source_roots, &property_name)
        });

        match report {
            Ok(report) => ToolResponse::ok(
                "config impact analysis completed",
                serde_json::to_value(&report).unwrap_or(Value::Null),
            ),
            Err(e) => ToolResponse::failed(format!("config impact analysis failed: {}", e), ErrorCategory::ExecutionError),
        }
    }
}

/// Scans configured repository roots for a literal or regex pattern
/// (spec §4.7).
pub struct CrossRepoTracerTool {
    config: CrossRepoConfig,
}

impl CrossRepoTracerTool {
    pub fn new(config: CrossRepoConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Tool for CrossRepoTracerTool {
    fn name(&self) -> &str {
        "cross_repo_tracer"
    }

    fn parameter_schema(&self) -> Vec<ParamSchema> {
        vec![
            ParamSchema {
                name: "term".into(),
                param_type: "string".into(),
                required: true,
                default: None,
            },
            ParamSchema {
                name: "is_regex".into(),
                param_type: "boolean".into(),
                required: false,
                default: Some(json!(false)),
            },
            ParamSchema {
                name: "case_sensitive".into(),
                param_type: "boolean".into(),
                required: false,
                default: Some(json!(false)),
            },
        ]
    }

    async fn execute(
        &self,
        parameters: &HashMap<String, Value>,
        _context: &HashMap<String, Value>,
    ) -> ToolResponse {
        let Some(term) = param_str(parameters, "term") else {
            return ToolResponse::failed("missing required parameter 'term'", ErrorCategory::InvalidParameters);
        };
        let request = SearchRequest {
            term,
            is_regex: param_bool(parameters, "is_regex", false),
            case_sensitive: param_bool(parameters, "case_sensitive", false),
            extension_filter: param_str(parameters, "extension"),
            repository_filter: None,
        };

        let config = self.config.clone();
        let result = tokio::task::block_in_place(|| crossrepo::search(&config, &request));

        match result {
            Ok(summary) => ToolResponse::ok(
                "cross-repository search completed",
                serde_json::to_value(&summary).unwrap_or(Value::Null),
            ),
            Err(e) => ToolResponse::failed(format!("cross-repo search failed: {}", e), ErrorCategory::ExecutionError),
        }
    }
}
