use std::path::{Path, PathBuf};
use std::sync::Arc;

use codesift_core::config::{LlmConfig, VectorStoreConfig};
use codesift_core::types::EmbeddingMetadata;
use codesift_core::{CodeSiftError, Result};
use dashmap::DashMap;
use tracing::{info, warn};

use crate::embedding::EmbeddingClient;
use crate::failure::FailureRegistry;
use crate::index::cosine_similarity;
use crate::namespace::Namespace;

fn namespaces_manifest_path(data_dir: &Path) -> PathBuf {
    data_dir.join("namespaces.json")
}

/// Top-level vector store API: owns every namespace plus the embedding
/// client shared across them (spec §4.4).
pub struct VectorStore {
    data_dir: PathBuf,
    config: VectorStoreConfig,
    namespaces: DashMap<String, Arc<Namespace>>,
    embedding_client: EmbeddingClient,
}

impl VectorStore {
    /// Loads the namespace manifest and rebuilds every namespace's index
    /// from its persisted vectors (spec §4.4, "On startup: load namespace
    /// list, then for each namespace load metadata and rebuild the ANN
    /// index from persisted vector files").
    pub fn load(config: VectorStoreConfig, llm: LlmConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let data_dir = PathBuf::from(&config.data_dir);

        let manifest_path = namespaces_manifest_path(&data_dir);
        let names: Vec<String> = if manifest_path.exists() {
            let raw = std::fs::read_to_string(&manifest_path)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            Vec::new()
        };

        let namespaces = DashMap::new();
        for name in &names {
            match Namespace::load(
                name,
                &data_dir,
                config.dimension,
                config.max_connections,
                config.ef_construction,
                config.ef,
            ) {
                Ok(ns) => {
                    namespaces.insert(name.clone(), Arc::new(ns));
                }
                Err(e) => {
                    warn!(namespace = name, error = %e, "failed to load namespace, skipping");
                }
            }
        }
        info!(namespaces = namespaces.len(), "vector store loaded");

        let failures = FailureRegistry::load(&data_dir)?;
        let embedding_client =
            EmbeddingClient::new(llm, failures, config.continuous_failure_threshold)?;

        Ok(Self {
            data_dir,
            config,
            namespaces,
            embedding_client,
        })
    }

    fn persist_manifest(&self) -> Result<()> {
        let names: Vec<String> = self.namespaces.iter().map(|e| e.key().clone()).collect();
        let raw = serde_json::to_string_pretty(&names).map_err(CodeSiftError::Serialization)?;
        std::fs::write(namespaces_manifest_path(&self.data_dir), raw)?;
        Ok(())
    }

    fn namespace_or_create(&self, name: &str) -> Result<Arc<Namespace>> {
        if let Some(ns) = self.namespaces.get(name) {
            return Ok(ns.clone());
        }
        let ns = Arc::new(Namespace::create(
            name,
            &self.data_dir,
            self.config.dimension,
            self.config.max_connections,
            self.config.ef_construction,
            self.config.ef,
        ));
        self.namespaces.insert(name.to_string(), ns.clone());
        self.persist_manifest()?;
        Ok(ns)
    }

    pub fn is_degraded(&self) -> bool {
        self.embedding_client.is_degraded()
    }

    pub async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        self.embedding_client.generate_embedding(text).await
    }

    pub fn store_embedding(
        &self,
        namespace: &str,
        id: &str,
        vector: Vec<f32>,
        metadata: EmbeddingMetadata,
    ) -> Result<()> {
        if vector.len() != self.config.dimension {
            return Err(CodeSiftError::Validation(format!(
                "embedding dimension {} does not match configured dimension {}",
                vector.len(),
                self.config.dimension
            )));
        }
        let ns = self.namespace_or_create(namespace)?;
        ns.store(id, vector, metadata)
    }

    pub fn delete_embedding(&self, namespace: &str, id: &str) -> Result<()> {
        match self.namespaces.get(namespace) {
            Some(ns) => ns.delete(id),
            None => Ok(()),
        }
    }

    /// Searches a single namespace for the `limit` most similar vectors to
    /// `query`, each paired with its metadata.
    pub fn find_similar(
        &self,
        namespace: &str,
        query: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<(String, f32, EmbeddingMetadata)>> {
        let Some(ns) = self.namespaces.get(namespace) else {
            return Ok(Vec::new());
        };
        let hits = ns.index.search(query, limit, min_similarity);
        Ok(hits
            .into_iter()
            .filter_map(|(id, similarity)| {
                let metadata = ns.metadata.get(&id)?.clone();
                Some((id, similarity, metadata))
            })
            .collect())
    }

    /// Searches across every namespace, merging and re-sorting results by
    /// similarity (used by cross-repository style queries).
    pub fn find_similar_all_namespaces(
        &self,
        query: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> Vec<(String, String, f32, EmbeddingMetadata)> {
        let mut merged: Vec<(String, String, f32, EmbeddingMetadata)> = self
            .namespaces
            .iter()
            .flat_map(|entry| {
                let namespace = entry.key().clone();
                entry
                    .value()
                    .index
                    .search(query, limit, min_similarity)
                    .into_iter()
                    .filter_map(|(id, similarity)| {
                        let metadata = entry.value().metadata.get(&id)?.clone();
                        Some((namespace.clone(), id, similarity, metadata))
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        merged.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
        merged.truncate(limit);
        merged
    }

    pub fn namespace_names(&self) -> Vec<String> {
        self.namespaces.iter().map(|e| e.key().clone()).collect()
    }

    pub fn exact_similarity(a: &[f32], b: &[f32]) -> f32 {
        cosine_similarity(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_metadata() -> EmbeddingMetadata {
        EmbeddingMetadata {
            source_id: "e1".into(),
            entity_type: "method".into(),
            file_path: "src/Bar.java".into(),
            start_line: 5,
            end_line: 20,
            content: "void bar() {}".into(),
            language: "java".into(),
            description: None,
            purpose: None,
            capabilities: Vec::new(),
            usage_examples: Vec::new(),
        }
    }

    fn test_config(dir: &Path) -> VectorStoreConfig {
        VectorStoreConfig {
            dimension: 3,
            data_dir: dir.to_string_lossy().into_owned(),
            max_connections: 16,
            ef_construction: 100,
            ef: 32,
            continuous_failure_threshold: 5,
        }
    }

    #[test]
    fn store_and_find_similar_round_trips() {
        let dir = tempdir().unwrap();
        let store = VectorStore::load(test_config(dir.path()), LlmConfig::default()).unwrap();
        store
            .store_embedding("repo-a", "e1", vec![1.0, 0.0, 0.0], sample_metadata())
            .unwrap();

        let hits = store.find_similar("repo-a", &[1.0, 0.0, 0.0], 5, 0.5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "e1");
    }

    #[test]
    fn rejects_wrong_dimension() {
        let dir = tempdir().unwrap();
        let store = VectorStore::load(test_config(dir.path()), LlmConfig::default()).unwrap();
        let err = store.store_embedding("repo-a", "e1", vec![1.0, 0.0], sample_metadata());
        assert!(err.is_err());
    }

    #[test]
    fn reload_recovers_namespaces_and_manifest() {
        let dir = tempdir().unwrap();
        {
            let store = VectorStore::load(test_config(dir.path()), LlmConfig::default()).unwrap();
            store
                .store_embedding("repo-a", "e1", vec![0.0, 1.0, 0.0], sample_metadata())
                .unwrap();
        }
        let reloaded = VectorStore::load(test_config(dir.path()), LlmConfig::default()).unwrap();
        assert_eq!(reloaded.namespace_names(), vec!["repo-a".to_string()]);
        let hits = reloaded.find_similar("repo-a", &[0.0, 1.0, 0.0], 1, 0.5).unwrap();
        assert_eq!(hits.len(), 1);
    }
}
