use serde::{Deserialize, Serialize};

use crate::error::{CodeSiftError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    pub dimension: usize,
    pub data_dir: String,
    pub max_connections: usize,
    pub ef_construction: usize,
    pub ef: usize,
    pub continuous_failure_threshold: u32,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            dimension: 3072,
            data_dir: "data/vectors".into(),
            max_connections: 16,
            ef_construction: 200,
            ef: 64,
            continuous_failure_threshold: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridConfig {
    pub enable_dynamic_tools: bool,
    pub max_execution_time_seconds: u64,
    pub fallback_to_static: bool,
    pub use_knowledge_graph: bool,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            enable_dynamic_tools: true,
            max_execution_time_seconds: 30,
            fallback_to_static: true,
            use_knowledge_graph: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub delay_ms: u64,
    pub backoff_multiplier: f64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_ms: 200,
            backoff_multiplier: 2.0,
            max_delay_ms: 5_000,
            jitter: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    pub max_concurrent_executions: usize,
    pub thread_pool_queue_capacity: usize,
    pub tool_execution_timeout_seconds: u64,
    pub retry: RetryConfig,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            max_concurrent_executions: num_cpus_or_four(),
            thread_pool_queue_capacity: 256,
            tool_execution_timeout_seconds: 30,
            retry: RetryConfig::default(),
        }
    }
}

fn num_cpus_or_four() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().max(4))
        .unwrap_or(4)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossRepoConfig {
    pub roots: Vec<String>,
    pub context_lines: usize,
    pub max_references_per_repo: usize,
    pub thread_pool_size: usize,
    pub search_timeout_seconds: u64,
}

impl Default for CrossRepoConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            context_lines: 2,
            max_references_per_repo: 1000,
            thread_pool_size: 4,
            search_timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub chat_endpoint: String,
    pub embedding_endpoint: String,
    pub access_key: String,
    pub model: String,
    pub model_version: String,
    pub connect_timeout_seconds: u64,
    pub read_timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            chat_endpoint: "http://localhost:8081/v1/chat/completions".into(),
            embedding_endpoint: "http://localhost:8081/v1/embeddings".into(),
            access_key: String::new(),
            model: "code-intel-classifier".into(),
            model_version: "v1".into(),
            connect_timeout_seconds: 5,
            read_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigImpactConfig {
    pub resource_paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeGraphConfig {
    pub data_dir: String,
}

impl Default for KnowledgeGraphConfig {
    fn default() -> Self {
        Self {
            data_dir: "data/graph".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub hybrid: HybridConfig,
    #[serde(default)]
    pub mcp: McpConfig,
    #[serde(default)]
    pub crossrepo: CrossRepoConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub configimpact: ConfigImpactConfig,
    #[serde(default)]
    pub knowledge_graph: KnowledgeGraphConfig,
}

impl Settings {
    /// Loads configuration layered as defaults -> `config/default.toml` (if
    /// present) -> `CODESIFT_*` environment variables, mirroring the
    /// teacher's `config::Config` composition.
    pub fn load() -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::with_prefix("CODESIFT").separator("__"));

        let raw = builder
            .build()
            .map_err(|e| CodeSiftError::Configuration(e.to_string()))?;

        // `config` only fills in keys present in the source; merge onto
        // defaults so partially-specified files/env still produce a
        // complete, valid `Settings`.
        let mut settings = Settings::default();
        if let Ok(partial) = raw.try_deserialize::<serde_json::Value>() {
            if let Ok(merged) = merge_defaults(&settings, partial) {
                settings = merged;
            }
        }
        Ok(settings)
    }
}

fn merge_defaults(defaults: &Settings, overrides: serde_json::Value) -> Result<Settings> {
    let mut base = serde_json::to_value(defaults).map_err(CodeSiftError::Serialization)?;
    deep_merge(&mut base, overrides);
    serde_json::from_value(base).map_err(CodeSiftError::Serialization)
}

fn deep_merge(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                deep_merge(base_map.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value;
        }
    }
}
