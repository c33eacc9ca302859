use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use codesift_core::config::{McpConfig, RetryConfig};
use codesift_core::types::{ErrorCategory, ExecutionPlan, QueryResult, ToolResponse};
use rand::Rng;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{error, warn};

use crate::registry::ToolRegistry;

/// Thread-pool observability counters (spec §4.3, "Shutdown... must expose
/// metrics").
#[derive(Default)]
pub struct ExecutorMetrics {
    pub active: AtomicU64,
    pub completed: AtomicU64,
    pub total: AtomicU64,
}

impl ExecutorMetrics {
    pub fn snapshot(&self) -> Value {
        serde_json::json!({
            "active": self.active.load(Ordering::Relaxed),
            "completed": self.completed.load(Ordering::Relaxed),
            "total": self.total.load(Ordering::Relaxed),
        })
    }
}

/// Runs execution-plan steps on a bounded worker pool with per-step
/// timeout, retry, and required/optional semantics (spec §4.3).
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    config: McpConfig,
    semaphore: Arc<Semaphore>,
    metrics: Arc<ExecutorMetrics>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, config: McpConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_executions));
        Self {
            registry,
            config,
            semaphore,
            metrics: Arc::new(ExecutorMetrics::default()),
        }
    }

    pub fn metrics(&self) -> Value {
        self.metrics.snapshot()
    }

    /// Validates the plan, then runs steps in descending priority order,
    /// stopping early on a failed required step.
    pub async fn execute(&self, plan: &ExecutionPlan) -> QueryResult {
        if plan.query.trim().is_empty() {
            return QueryResult {
                query: plan.query.clone(),
                success: false,
                fallback_used: false,
                error_message: Some("query must not be empty".to_string()),
                tool_responses: HashMap::new(),
                tool_errors: HashMap::new(),
                requested_tools: Vec::new(),
                knowledge_graph_entities: Vec::new(),
                knowledge_graph_relationships: Vec::new(),
            };
        }

        if plan.steps.is_empty() {
            return QueryResult {
                query: plan.query.clone(),
                success: true,
                fallback_used: false,
                error_message: None,
                tool_responses: HashMap::new(),
                tool_errors: HashMap::new(),
                requested_tools: Vec::new(),
                knowledge_graph_entities: Vec::new(),
                knowledge_graph_relationships: Vec::new(),
            };
        }

        let mut ordered_steps = plan.steps.clone();
        ordered_steps.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut shared_context = plan.context.clone();
        let mut tool_responses = HashMap::new();
        let mut tool_errors: HashMap<String, Vec<ErrorCategory>> = HashMap::new();
        let mut requested_tools = Vec::new();
        let mut success = true;

        for step in &ordered_steps {
            requested_tools.push(step.tool_name.clone());

            let Some(tool) = self.registry.get(&step.tool_name) else {
                let categories = vec![ErrorCategory::InvalidParameters];
                tool_errors.insert(step.tool_name.clone(), categories);
                if step.required {
                    success = false;
                    break;
                }
                continue;
            };

            self.metrics.total.fetch_add(1, Ordering::Relaxed);
            self.metrics.active.fetch_add(1, Ordering::Relaxed);
            let permit = self.semaphore.clone().acquire_owned().await;
            let response = self
                .run_with_retry(tool, &step.tool_name, &step.parameters, &shared_context)
                .await;
            drop(permit);
            self.metrics.active.fetch_sub(1, Ordering::Relaxed);
            self.metrics.completed.fetch_add(1, Ordering::Relaxed);

            if !response.success {
                tool_errors.insert(step.tool_name.clone(), response.error_categories.clone());
                tool_responses.insert(step.tool_name.clone(), response.data.clone().unwrap_or(Value::Null));
                if step.required {
                    success = false;
                    break;
                }
                continue;
            }

            if let Some(data) = &response.data {
                shared_context.insert(format!("{}_results", step.tool_name), data.clone());
                if let Some(obj) = data.as_object() {
                    for (field, value) in obj {
                        shared_context.insert(format!("{}_{}", step.tool_name, field), value.clone());
                    }
                }
            }
            tool_responses.insert(step.tool_name.clone(), response.data.unwrap_or(Value::Null));
        }

        QueryResult {
            query: plan.query.clone(),
            success,
            fallback_used: false,
            error_message: None,
            tool_responses,
            tool_errors,
            requested_tools,
            knowledge_graph_entities: Vec::new(),
            knowledge_graph_relationships: Vec::new(),
        }
    }

    async fn run_with_retry(
        &self,
        tool: Arc<dyn codesift_core::tool::Tool>,
        tool_name: &str,
        parameters: &HashMap<String, Value>,
        context: &HashMap<String, Value>,
    ) -> ToolResponse {
        let retry = &self.config.retry;
        let timeout = Duration::from_secs(self.config.tool_execution_timeout_seconds);
        let mut last_response = ToolResponse::failed("no attempts made", ErrorCategory::ExecutionError);

        for attempt in 0..=retry.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(retry, attempt)).await;
            }

            let call = tool.execute(parameters, context);
            last_response = match tokio::time::timeout(timeout, call).await {
                Ok(response) => response,
                Err(_) => {
                    warn!(tool = tool_name, attempt, "tool execution timed out");
                    ToolResponse::failed(
                        format!("tool '{}' timed out after {:?}", tool_name, timeout),
                        ErrorCategory::ExecutionTimeout,
                    )
                }
            };

            if last_response.success {
                return last_response;
            }
            if !is_retryable(&last_response) {
                break;
            }
        }

        if !last_response.success {
            error!(tool = tool_name, "tool execution failed after retries");
        }
        last_response
    }
}

fn is_retryable(response: &ToolResponse) -> bool {
    !response.error_categories.iter().any(|c| {
        matches!(
            c,
            ErrorCategory::InvalidParameters
                | ErrorCategory::ResourceExhaustion
                | ErrorCategory::ExecutionInterrupted
                | ErrorCategory::ExecutionTimeout
        )
    })
}

fn backoff_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let base = retry.delay_ms as f64 * retry.backoff_multiplier.powi(attempt as i32 - 1);
    let mut delay_ms = base.min(retry.max_delay_ms as f64);
    if retry.jitter {
        let jitter_fraction = rand::rng().random_range(-0.2..=0.2);
        delay_ms += delay_ms * jitter_fraction;
    }
    Duration::from_millis(delay_ms.max(0.0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use codesift_core::tool::{ParamSchema, Tool};
    use std::sync::atomic::AtomicU32;

    struct AlwaysFails;

    #[async_trait]
    impl Tool for AlwaysFails {
        fn name(&self) -> &str {
            "always_fails"
        }
        fn parameter_schema(&self) -> Vec<ParamSchema> {
            Vec::new()
        }
        async fn execute(&self, _p: &HashMap<String, Value>, _c: &HashMap<String, Value>) -> ToolResponse {
            ToolResponse::failed("boom", ErrorCategory::ExecutionError)
        }
    }

    struct CountingTool {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            "counting"
        }
        fn parameter_schema(&self) -> Vec<ParamSchema> {
            Vec::new()
        }
        async fn execute(&self, _p: &HashMap<String, Value>, _c: &HashMap<String, Value>) -> ToolResponse {
            self.calls.fetch_add(1, Ordering::Relaxed);
            ToolResponse::failed("still failing", ErrorCategory::ExecutionError)
        }
    }

    fn test_plan(tool_name: &str, required: bool) -> ExecutionPlan {
        ExecutionPlan {
            query: "test query".into(),
            path_type: codesift_core::types::PathType::Static,
            steps: vec![codesift_core::types::ToolStep {
                tool_name: tool_name.into(),
                parameters: HashMap::new(),
                priority: 0,
                required,
            }],
            context: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn empty_query_fails_validation() {
        let registry = Arc::new(ToolRegistry::new());
        let executor = ToolExecutor::new(registry, McpConfig::default());
        let mut plan = test_plan("vector_search", true);
        plan.query = "".into();
        let result = executor.execute(&plan).await;
        assert!(!result.success);
        assert!(result.error_message.is_some());
    }

    #[tokio::test]
    async fn missing_required_tool_fails_request() {
        let registry = Arc::new(ToolRegistry::new());
        let executor = ToolExecutor::new(registry, McpConfig::default());
        let plan = test_plan("does_not_exist", true);
        let result = executor.execute(&plan).await;
        assert!(!result.success);
        assert!(result.tool_errors.contains_key("does_not_exist"));
    }

    #[tokio::test]
    async fn missing_optional_tool_does_not_fail_request() {
        let registry = Arc::new(ToolRegistry::new());
        let executor = ToolExecutor::new(registry, McpConfig::default());
        let plan = test_plan("does_not_exist", false);
        let result = executor.execute(&plan).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn required_failure_stops_request() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(AlwaysFails)).unwrap();
        let mut config = McpConfig::default();
        config.retry.max_retries = 0;
        let executor = ToolExecutor::new(registry, config);
        let plan = test_plan("always_fails", true);
        let result = executor.execute(&plan).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn retries_up_to_max_retries_times() {
        let calls = Arc::new(AtomicU32::new(0));
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(CountingTool { calls: calls.clone() })).unwrap();
        let mut config = McpConfig::default();
        config.retry.max_retries = 2;
        config.retry.delay_ms = 1;
        let executor = ToolExecutor::new(registry, config);
        let plan = test_plan("counting", false);
        executor.execute(&plan).await;
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }
}
