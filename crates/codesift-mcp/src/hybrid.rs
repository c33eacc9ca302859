use std::collections::HashMap;
use std::sync::Arc;

use codesift_core::config::{HybridConfig, McpConfig};
use codesift_core::types::QueryResult;
use codesift_graph::KnowledgeGraph;
use serde_json::json;
use tracing::error;

use crate::classifier::QueryClassifier;
use crate::executor::ToolExecutor;
use crate::planner::build_plan;

const ENRICHMENT_ENTITY_LIMIT: usize = 5;
const ENRICHMENT_DEPTH: u32 = 1;

/// Composes the classifier, planner, executor, and knowledge-graph
/// enrichment into a single query path (spec §4.6). Holds no long-lived
/// state of its own beyond references to the components it orchestrates.
pub struct HybridEngine {
    classifier: QueryClassifier,
    executor: ToolExecutor,
    knowledge_graph: Option<Arc<KnowledgeGraph>>,
    hybrid_config: HybridConfig,
    _mcp_config: McpConfig,
}

impl HybridEngine {
    pub fn new(
        classifier: QueryClassifier,
        executor: ToolExecutor,
        knowledge_graph: Option<Arc<KnowledgeGraph>>,
        hybrid_config: HybridConfig,
        mcp_config: McpConfig,
    ) -> Self {
        Self {
            classifier,
            executor,
            knowledge_graph,
            hybrid_config,
            _mcp_config: mcp_config,
        }
    }

    pub async fn process(&self, query: &str) -> QueryResult {
        let path = self.classifier.classify(query).await;
        let plan = build_plan(&path, &self.hybrid_config);

        let enrichment = if plan.context.get("requires_knowledge_graph").is_some() {
            self.enrich(query)
        } else {
            None
        };

        let mut result = self.executor.execute(&plan).await;

        if let Some((entities, relationships)) = enrichment {
            result.knowledge_graph_entities = entities;
            result.knowledge_graph_relationships = relationships;
        }

        if !result.success {
            if self.hybrid_config.fallback_to_static {
                return self.fallback(query, result).await;
            }
        }

        result
    }

    /// Looks up up to `ENRICHMENT_ENTITY_LIMIT` entities matching the
    /// query text and fetches their 1-hop relationships (spec §4.6 step 3).
    fn enrich(
        &self,
        query: &str,
    ) -> Option<(
        Vec<codesift_core::types::CodeEntity>,
        Vec<codesift_core::types::CodeRelationship>,
    )> {
        let graph = self.knowledge_graph.as_ref()?;
        let entities = graph.search(query, ENRICHMENT_ENTITY_LIMIT);
        let relationships = entities
            .iter()
            .flat_map(|e| graph.find_related(&e.id, ENRICHMENT_DEPTH))
            .collect();
        Some((entities, relationships))
    }

    /// On a failed result, re-runs `vector_search` directly and returns it
    /// as a fallback (spec §4.6 step 6).
    async fn fallback(&self, query: &str, failed_result: QueryResult) -> QueryResult {
        error!(query, "execution failed, falling back to direct vector search");
        let plan = codesift_core::types::ExecutionPlan {
            query: query.to_string(),
            path_type: codesift_core::types::PathType::Static,
            steps: vec![codesift_core::types::ToolStep {
                tool_name: "vector_search".to_string(),
                parameters: HashMap::from([
                    ("query".to_string(), json!(query)),
                    ("limit".to_string(), json!(10)),
                ]),
                priority: 0,
                required: true,
            }],
            context: HashMap::new(),
        };
        let mut fallback_result = self.executor.execute(&plan).await;
        fallback_result.fallback_used = true;
        if !fallback_result.success {
            fallback_result.error_message = failed_result
                .error_message
                .or(Some("execution and fallback both failed".to_string()));
        }
        fallback_result
    }
}
