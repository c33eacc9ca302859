use std::collections::HashMap;

use codesift_core::config::HybridConfig;
use codesift_core::types::{AnalysisPath, ExecutionPlan, PathType, ToolStep};
use serde_json::{json, Value};

/// Turns an analysis path into an ordered sequence of tool steps (spec
/// §4.2).
pub fn build_plan(path: &AnalysisPath, hybrid: &HybridConfig) -> ExecutionPlan {
    let mut steps = vec![ToolStep {
        tool_name: "vector_search".to_string(),
        parameters: HashMap::from([
            ("query".to_string(), json!(path.query)),
            ("limit".to_string(), json!(10)),
        ]),
        priority: 0,
        required: true,
    }];

    let dynamic_enabled = hybrid.enable_dynamic_tools
        && matches!(path.path_type, PathType::Hybrid | PathType::Dynamic);

    if dynamic_enabled {
        for tool in dedup(&path.required_tools) {
            if tool == "vector_search" {
                continue;
            }
            let priority = if tool == "cross_repo_tracer" { 2 } else { 3 };
            steps.push(ToolStep {
                tool_name: tool.clone(),
                parameters: tool_parameters(&tool, &path.query),
                priority,
                required: false,
            });
        }
    }

    let mut context = HashMap::new();
    if hybrid.use_knowledge_graph || path.flags.use_knowledge_graph {
        context.insert("requires_knowledge_graph".to_string(), json!(true));
    }

    ExecutionPlan {
        query: path.query.clone(),
        path_type: path.path_type,
        steps,
        context,
    }
}

fn dedup(tools: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tools
        .iter()
        .filter(|t| seen.insert((*t).clone()))
        .cloned()
        .collect()
}

fn tool_parameters(tool: &str, query: &str) -> HashMap<String, Value> {
    match tool {
        "config_impact_analyzer" => {
            HashMap::from([("property_name".to_string(), json!(extract_property_name(query)))])
        }
        "cross_repo_tracer" => HashMap::from([("term".to_string(), json!(query))]),
        _ => HashMap::from([("query".to_string(), json!(query))]),
    }
}

/// The query text often names the property directly (e.g. "what changes if
/// I set spring.datasource.url"); take the last dotted token as a
/// best-effort property name.
fn extract_property_name(query: &str) -> String {
    query
        .split_whitespace()
        .rev()
        .find(|w| w.contains('.'))
        .unwrap_or(query)
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '.' && c != '*')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesift_core::types::{AnalysisFlags, QueryCategory};

    fn path_with(tools: Vec<&str>, category: QueryCategory) -> AnalysisPath {
        AnalysisPath {
            path_type: category.path_type(),
            confidence: 0.8,
            required_tools: tools.into_iter().map(String::from).collect(),
            flags: AnalysisFlags::default(),
            query: "what changes if I set spring.datasource.url".to_string(),
        }
    }

    #[test]
    fn vector_search_always_first_and_required() {
        let plan = build_plan(&path_with(vec!["vector_search"], QueryCategory::CodeSearch), &HybridConfig::default());
        assert_eq!(plan.steps[0].tool_name, "vector_search");
        assert_eq!(plan.steps[0].priority, 0);
        assert!(plan.steps[0].required);
    }

    #[test]
    fn hybrid_path_appends_dynamic_tools_as_optional() {
        let path = path_with(vec!["vector_search", "config_impact_analyzer"], QueryCategory::ConfigImpact);
        let plan = build_plan(&path, &HybridConfig::default());
        assert_eq!(plan.steps.len(), 2);
        let extra = &plan.steps[1];
        assert_eq!(extra.tool_name, "config_impact_analyzer");
        assert_eq!(extra.priority, 3);
        assert!(!extra.required);
        assert_eq!(
            extra.parameters.get("property_name").and_then(|v| v.as_str()),
            Some("spring.datasource.url")
        );
    }

    #[test]
    fn static_path_never_appends_dynamic_tools() {
        let path = path_with(vec!["vector_search"], QueryCategory::CodeSearch);
        let plan = build_plan(&path, &HybridConfig::default());
        assert_eq!(plan.steps.len(), 1);
    }

    #[test]
    fn disabled_dynamic_tools_config_suppresses_extras() {
        let path = path_with(vec!["vector_search", "cross_repo_tracer"], QueryCategory::CrossRepo);
        let mut hybrid = HybridConfig::default();
        hybrid.enable_dynamic_tools = false;
        let plan = build_plan(&path, &hybrid);
        assert_eq!(plan.steps.len(), 1);
    }
}
