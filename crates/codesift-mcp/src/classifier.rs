use std::time::Duration;

use codesift_core::config::LlmConfig;
use codesift_core::types::{AnalysisFlags, AnalysisPath, PathType, QueryCategory};
use serde_json::{json, Value};
use tracing::warn;

const CLASSIFIER_TEMPERATURE: f64 = 0.1;
const CLASSIFIER_MAX_TOKENS: u32 = 64;

fn fallback_path(query: &str) -> AnalysisPath {
    AnalysisPath {
        path_type: PathType::Static,
        confidence: 0.5,
        required_tools: vec!["vector_search".to_string()],
        flags: AnalysisFlags::default(),
        query: query.to_string(),
    }
}

fn default_tools_for(category: QueryCategory) -> Vec<String> {
    match category {
        QueryCategory::ConfigImpact => vec!["vector_search".into(), "config_impact_analyzer".into()],
        QueryCategory::CrossRepo => vec!["vector_search".into(), "cross_repo_tracer".into()],
        QueryCategory::ErrorChain | QueryCategory::CallPath => vec!["vector_search".into()],
        QueryCategory::CodeStructure => vec!["vector_search".into()],
        QueryCategory::CodeSearch | QueryCategory::General => vec!["vector_search".into()],
    }
}

fn parse_category(raw: &str) -> Option<QueryCategory> {
    match raw.trim().to_uppercase().as_str() {
        "CODE_SEARCH" => Some(QueryCategory::CodeSearch),
        "CALL_PATH" => Some(QueryCategory::CallPath),
        "CONFIG_IMPACT" => Some(QueryCategory::ConfigImpact),
        "ERROR_CHAIN" => Some(QueryCategory::ErrorChain),
        "CROSS_REPO" => Some(QueryCategory::CrossRepo),
        "CODE_STRUCTURE" => Some(QueryCategory::CodeStructure),
        "GENERAL" => Some(QueryCategory::General),
        _ => None,
    }
}

/// Parses the classifier's one-line verdict: `CATEGORY|confidence|comma_tools`
/// (spec §4.1).
fn parse_verdict(query: &str, line: &str) -> AnalysisPath {
    let parts: Vec<&str> = line.trim().splitn(3, '|').collect();
    let Some(category) = parts.first().and_then(|c| parse_category(c)) else {
        return fallback_path(query);
    };
    let confidence = parts
        .get(1)
        .and_then(|c| c.trim().parse::<f32>().ok())
        .unwrap_or(0.5)
        .clamp(0.0, 1.0);

    let mut tools: Vec<String> = parts
        .get(2)
        .map(|t| {
            t.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();
    if tools.is_empty() {
        tools = default_tools_for(category);
    }

    let mut flags = AnalysisFlags::default();
    if category == QueryCategory::CodeStructure {
        flags.use_knowledge_graph = true;
    }

    AnalysisPath {
        path_type: category.path_type(),
        confidence,
        required_tools: tools,
        flags,
        query: query.to_string(),
    }
}

/// Delegates query classification to an upstream chat-completion service
/// with deterministic parameters, never failing the caller's request
/// (spec §4.1).
pub struct QueryClassifier {
    client: reqwest::Client,
    config: LlmConfig,
}

impl QueryClassifier {
    pub fn new(config: LlmConfig) -> codesift_core::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .timeout(Duration::from_secs(config.read_timeout_seconds))
            .build()
            .map_err(|e| codesift_core::CodeSiftError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub async fn classify(&self, query: &str) -> AnalysisPath {
        match self.call_chat_completion(query).await {
            Ok(line) => parse_verdict(query, &line),
            Err(e) => {
                warn!(error = %e, "classifier call failed, using fallback path");
                fallback_path(query)
            }
        }
    }

    async fn call_chat_completion(&self, query: &str) -> codesift_core::Result<String> {
        let prompt = format!(
            "Classify this query into one line: CATEGORY|confidence|comma_tools. \
             Categories: CODE_SEARCH, CALL_PATH, CONFIG_IMPACT, ERROR_CHAIN, CROSS_REPO, \
             CODE_STRUCTURE, GENERAL. Query: {}",
            query
        );
        let body = json!({
            "prompt": prompt,
            "model": self.config.model,
            "modelVersion": self.config.model_version,
            "temperature": CLASSIFIER_TEMPERATURE,
            "maxTokens": CLASSIFIER_MAX_TOKENS,
        });

        let response = self
            .client
            .post(&self.config.chat_endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| codesift_core::CodeSiftError::Network(e.to_string()))?;

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| codesift_core::CodeSiftError::External(format!("invalid classifier response: {}", e)))?;

        if envelope.get("result").and_then(|v| v.as_bool()) != Some(true) {
            let message = envelope
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("classifier reported failure")
                .to_string();
            return Err(codesift_core::CodeSiftError::External(message));
        }

        let content = envelope
            .pointer("/data/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| codesift_core::CodeSiftError::External("classifier response missing content".into()))?;

        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_verdict() {
        let path = parse_verdict("where is X", "CODE_SEARCH|0.85|vector_search");
        assert_eq!(path.path_type, PathType::Static);
        assert!((path.confidence - 0.85).abs() < 1e-6);
        assert_eq!(path.required_tools, vec!["vector_search".to_string()]);
    }

    #[test]
    fn injects_default_tools_when_omitted() {
        let path = parse_verdict("impact of X", "CONFIG_IMPACT|0.9|");
        assert_eq!(path.path_type, PathType::Hybrid);
        assert_eq!(
            path.required_tools,
            vec!["vector_search".to_string(), "config_impact_analyzer".to_string()]
        );
    }

    #[test]
    fn code_structure_sets_knowledge_graph_flag() {
        let path = parse_verdict("class hierarchy of X", "CODE_STRUCTURE|0.8|vector_search");
        assert!(path.flags.use_knowledge_graph);
    }

    #[test]
    fn unparseable_category_falls_back() {
        let path = parse_verdict("???", "not a verdict");
        assert_eq!(path.path_type, PathType::Static);
        assert!((path.confidence - 0.5).abs() < 1e-6);
        assert_eq!(path.required_tools, vec!["vector_search".to_string()]);
    }
}
