use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use codesift_core::config::LlmConfig;
use codesift_core::{CodeSiftError, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::failure::FailureRegistry;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    text: &'a str,
    model: &'a str,
    #[serde(rename = "modelVersion")]
    model_version: &'a str,
    access_key: &'a str,
}

/// The upstream embedding API may return the vector at two different JSON
/// paths (spec §9, "Embedding response shape ambiguity"): a flat `data`
/// array of floats, or `data[0].embedding`.
fn extract_vector(body: &Value) -> Option<Vec<f32>> {
    let data = body.get("data")?;
    if let Some(arr) = data.as_array() {
        if arr.is_empty() {
            return None;
        }
        if arr[0].is_number() {
            return arr.iter().map(|v| v.as_f64().map(|f| f as f32)).collect();
        }
        let embedding = arr[0].get("embedding")?.as_array()?;
        return embedding.iter().map(|v| v.as_f64().map(|f| f as f32)).collect();
    }
    None
}

/// Generates embeddings over HTTP with retry and continuous-failure
/// tracking (spec §4.4, §5 "Embedding failure degradation").
pub struct EmbeddingClient {
    client: reqwest::Client,
    config: LlmConfig,
    failures: FailureRegistry,
    continuous_failures: AtomicU32,
    degraded_threshold: u32,
}

impl EmbeddingClient {
    pub fn new(config: LlmConfig, failures: FailureRegistry, degraded_threshold: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .timeout(Duration::from_secs(config.read_timeout_seconds))
            .build()
            .map_err(|e| CodeSiftError::Network(e.to_string()))?;
        Ok(Self {
            client,
            config,
            failures,
            continuous_failures: AtomicU32::new(0),
            degraded_threshold,
        })
    }

    pub fn is_degraded(&self) -> bool {
        self.continuous_failures.load(Ordering::Relaxed) >= self.degraded_threshold
    }

    pub fn continuous_failures(&self) -> u32 {
        self.continuous_failures.load(Ordering::Relaxed)
    }

    /// Generates an embedding for `text`, retrying transient failures with
    /// exponential backoff (max 3 attempts). On final failure, persists a
    /// failure record keyed by the text hash and bumps the continuous
    /// failure counter.
    pub async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        if self.is_degraded() {
            return Err(CodeSiftError::External(
                "embedding generation degraded: continuous failure threshold exceeded".into(),
            ));
        }

        const MAX_ATTEMPTS: u32 = 3;
        let mut last_error = String::new();

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let delay_ms = 100u64 * 2u64.pow(attempt);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            match self.call_once(text).await {
                Ok(vector) => {
                    self.continuous_failures.store(0, Ordering::Relaxed);
                    return Ok(vector);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "embedding generation attempt failed");
                    last_error = e.to_string();
                }
            }
        }

        let new_count = self.continuous_failures.fetch_add(1, Ordering::Relaxed) + 1;
        self.failures.record(text, &last_error);
        if new_count >= self.degraded_threshold {
            error!(
                continuous_failures = new_count,
                "vector store entering degraded mode"
            );
        }
        Err(CodeSiftError::External(format!(
            "embedding generation failed after {} attempts: {}",
            MAX_ATTEMPTS, last_error
        )))
    }

    async fn call_once(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            text,
            model: &self.config.model,
            model_version: &self.config.model_version,
            access_key: &self.config.access_key,
        };

        let response = self
            .client
            .post(&self.config.embedding_endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| CodeSiftError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CodeSiftError::External(format!(
                "embedding endpoint returned HTTP {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| CodeSiftError::External(format!("invalid embedding response: {}", e)))?;

        let vector = extract_vector(&body)
            .ok_or_else(|| CodeSiftError::External("embedding response missing vector data".into()))?;

        if vector.is_empty() {
            return Err(CodeSiftError::External("empty embedding vector".into()));
        }

        debug!(dimension = vector.len(), "generated embedding");
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_flat_array_shape() {
        let body = serde_json::json!({ "data": [0.1, 0.2, 0.3] });
        assert_eq!(extract_vector(&body), Some(vec![0.1, 0.2, 0.3]));
    }

    #[test]
    fn extracts_nested_embedding_shape() {
        let body = serde_json::json!({ "data": [{ "embedding": [0.4, 0.5] }] });
        assert_eq!(extract_vector(&body), Some(vec![0.4, 0.5]));
    }

    #[test]
    fn rejects_empty_data() {
        let body = serde_json::json!({ "data": [] });
        assert_eq!(extract_vector(&body), None);
    }
}
