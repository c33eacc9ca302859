use std::path::{Path, PathBuf};
use std::sync::Arc;

use codesift_core::hashing::stable_hash;
use codesift_core::types::EmbeddingFailure;
use codesift_core::{CodeSiftError, Result};
use dashmap::DashMap;
use tracing::warn;

const PREVIEW_LEN: usize = 120;

/// Persisted record of embedding-generation failures, keyed by a stable
/// hash of the input text so repeated failures on the same text accumulate
/// a count instead of fanning out (spec §3, "Embedding failure").
#[derive(Clone)]
pub struct FailureRegistry {
    path: PathBuf,
    entries: Arc<DashMap<String, EmbeddingFailure>>,
}

impl FailureRegistry {
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join("embedding_failures.json");
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let list: Vec<EmbeddingFailure> = serde_json::from_str(&raw).unwrap_or_default();
            let map = DashMap::new();
            for entry in list {
                map.insert(entry.text_hash.clone(), entry);
            }
            map
        } else {
            DashMap::new()
        };
        Ok(Self {
            path,
            entries: Arc::new(entries),
        })
    }

    pub fn record(&self, text: &str, error: &str) {
        let hash = stable_hash(&[text]);
        let preview: String = text.chars().take(PREVIEW_LEN).collect();
        self.entries
            .entry(hash.clone())
            .and_modify(|f| {
                f.failure_count += 1;
                f.last_timestamp = chrono::Utc::now();
                f.last_error = error.to_string();
            })
            .or_insert_with(|| EmbeddingFailure {
                text_hash: hash,
                preview,
                failure_count: 1,
                last_timestamp: chrono::Utc::now(),
                last_error: error.to_string(),
            });
        if let Err(e) = self.flush() {
            warn!(error = %e, "failed to persist embedding failure registry");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let list: Vec<EmbeddingFailure> = self.entries.iter().map(|e| e.value().clone()).collect();
        let raw = serde_json::to_string_pretty(&list).map_err(CodeSiftError::Serialization)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn records_persist_across_reload() {
        let dir = tempdir().unwrap();
        let registry = FailureRegistry::load(dir.path()).unwrap();
        registry.record("hello world", "HTTP 500");
        registry.record("hello world", "HTTP 500");

        let reloaded = FailureRegistry::load(dir.path()).unwrap();
        assert_eq!(reloaded.len(), 1);
        let hash = stable_hash(&["hello world"]);
        let entry = reloaded.entries.get(&hash).unwrap();
        assert_eq!(entry.failure_count, 2);
    }
}
