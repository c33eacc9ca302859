use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Fixed-dimension embedding vector, metadata, and the namespace it lives in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingMetadata {
    pub source_id: String,
    pub entity_type: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    pub language: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub usage_examples: Vec<String>,
}

/// A text hash, truncated preview, failure count, last timestamp, last error.
/// Persisted across restarts so the engine can implement cool-down and
/// global-degradation decisions (spec §3, "Embedding failure").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingFailure {
    pub text_hash: String,
    pub preview: String,
    pub failure_count: u32,
    pub last_timestamp: chrono::DateTime<chrono::Utc>,
    pub last_error: String,
}

/// A code entity (knowledge graph node).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EntityType {
    Class,
    Interface,
    Method,
    Field,
    Package,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Class => "class",
            EntityType::Interface => "interface",
            EntityType::Method => "method",
            EntityType::Field => "field",
            EntityType::Package => "package",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeEntity {
    pub id: String,
    pub simple_name: String,
    pub fully_qualified_name: String,
    pub entity_type: EntityType,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
}

/// A code relationship (knowledge graph edge).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RelationshipType {
    Contains,
    Extends,
    Implements,
    Calls,
    References,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeRelationship {
    pub source_id: String,
    pub target_id: String,
    pub relationship_type: RelationshipType,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

/// Path-type verdict returned by the Query Classifier (spec §4.1).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PathType {
    Static,
    Hybrid,
    Dynamic,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum QueryCategory {
    CodeSearch,
    CallPath,
    ConfigImpact,
    ErrorChain,
    CrossRepo,
    CodeStructure,
    General,
}

impl QueryCategory {
    /// Category→path-type mapping from spec §4.1.
    pub fn path_type(&self) -> PathType {
        match self {
            QueryCategory::CodeSearch | QueryCategory::General | QueryCategory::CodeStructure => {
                PathType::Static
            }
            _ => PathType::Hybrid,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnalysisFlags {
    #[serde(default)]
    pub use_knowledge_graph: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisPath {
    pub path_type: PathType,
    pub confidence: f32,
    /// Ordered, may contain duplicates — deduped by the planner.
    pub required_tools: Vec<String>,
    pub flags: AnalysisFlags,
    pub query: String,
}

/// One step of an execution plan (spec §3, "Execution plan").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolStep {
    pub tool_name: String,
    pub parameters: HashMap<String, serde_json::Value>,
    pub priority: i32,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub query: String,
    pub path_type: PathType,
    pub steps: Vec<ToolStep>,
    pub context: HashMap<String, serde_json::Value>,
}

/// Stable error category strings surfaced on every failed tool response
/// (spec §4.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCategory {
    ExecutionTimeout,
    SystemOverloaded,
    ExecutionInterrupted,
    InvalidParameters,
    ResourceExhaustion,
    ExecutionError,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::ExecutionTimeout => "EXECUTION_TIMEOUT",
            ErrorCategory::SystemOverloaded => "SYSTEM_OVERLOADED",
            ErrorCategory::ExecutionInterrupted => "EXECUTION_INTERRUPTED",
            ErrorCategory::InvalidParameters => "INVALID_PARAMETERS",
            ErrorCategory::ResourceExhaustion => "RESOURCE_EXHAUSTION",
            ErrorCategory::ExecutionError => "EXECUTION_ERROR",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolResponse {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub error_categories: Vec<ErrorCategory>,
}

impl ToolResponse {
    pub fn ok(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            errors: Vec::new(),
            error_categories: Vec::new(),
        }
    }

    pub fn failed(message: impl Into<String>, category: ErrorCategory) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            errors: vec![category.as_str().to_string()],
            error_categories: vec![category],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QueryResult {
    pub query: String,
    pub success: bool,
    pub fallback_used: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub tool_responses: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub tool_errors: HashMap<String, Vec<ErrorCategory>>,
    #[serde(default)]
    pub requested_tools: Vec<String>,
    #[serde(default)]
    pub knowledge_graph_entities: Vec<CodeEntity>,
    #[serde(default)]
    pub knowledge_graph_relationships: Vec<CodeRelationship>,
}
