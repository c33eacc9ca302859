use std::path::{Path, PathBuf};

use codesift_core::types::EmbeddingMetadata;
use codesift_core::{CodeSiftError, Result};
use dashmap::DashMap;
use tracing::warn;

use crate::index::AnnIndex;

/// A logical partition of the vector store, typically one per repository
/// (spec §3, "Namespace"). Owns an in-memory ANN index, a metadata
/// mapping, and on-disk directories for vectors and metadata.
pub struct Namespace {
    pub name: String,
    dir: PathBuf,
    pub index: AnnIndex,
    pub metadata: DashMap<String, EmbeddingMetadata>,
}

impl Namespace {
    pub fn create(
        name: &str,
        root: &Path,
        dimension: usize,
        max_connections: usize,
        ef_construction: usize,
        ef: usize,
    ) -> Self {
        Self {
            name: name.to_string(),
            dir: root.join(name),
            index: AnnIndex::new(dimension, max_connections, ef_construction, ef),
            metadata: DashMap::new(),
        }
    }

    fn metadata_path(&self) -> PathBuf {
        self.dir.join("embedding_metadata.json")
    }

    fn vector_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.vec", sanitize_id(id)))
    }

    /// Loads metadata, then rebuilds the ANN index from persisted vector
    /// files. Metadata entries whose vector file is missing are pruned
    /// (spec §4.4, "On load, prune metadata entries whose vector file is
    /// missing").
    pub fn load(
        name: &str,
        root: &Path,
        dimension: usize,
        max_connections: usize,
        ef_construction: usize,
        ef: usize,
    ) -> Result<Self> {
        let ns = Self::create(name, root, dimension, max_connections, ef_construction, ef);
        let metadata_path = ns.metadata_path();
        if !metadata_path.exists() {
            return Ok(ns);
        }

        let raw = std::fs::read_to_string(&metadata_path)?;
        let entries: Vec<(String, EmbeddingMetadata)> =
            serde_json::from_str(&raw).map_err(CodeSiftError::Serialization)?;

        let mut loaded = 0usize;
        let mut pruned = 0usize;
        for (id, meta) in entries {
            let vector_path = ns.vector_path(&id);
            if !vector_path.exists() {
                pruned += 1;
                continue;
            }
            match read_vector(&vector_path) {
                Ok(vector) => {
                    ns.index.add(&id, vector);
                    ns.metadata.insert(id, meta);
                    loaded += 1;
                }
                Err(e) => {
                    warn!(namespace = name, id = %id, error = %e, "failed to read vector file, pruning");
                    pruned += 1;
                }
            }
        }
        if pruned > 0 {
            warn!(namespace = name, pruned, "pruned metadata entries with missing/unreadable vectors");
        }
        if loaded != ns.index.len() {
            warn!(
                namespace = name,
                metadata_count = loaded,
                index_count = ns.index.len(),
                "metadata/index count mismatch after load"
            );
        }
        Ok(ns)
    }

    /// Writes the vector file, then updates metadata and index. If the
    /// vector write fails, metadata and index are left untouched (spec
    /// §4.4 atomicity).
    pub fn store(&self, id: &str, vector: Vec<f32>, metadata: EmbeddingMetadata) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        write_vector(&self.vector_path(id), &vector)?;
        self.metadata.insert(id.to_string(), metadata);
        self.index.add(id, vector);
        self.persist_metadata()
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.index.delete(id);
        self.metadata.remove(id);
        let path = self.vector_path(id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        self.persist_metadata()
    }

    fn persist_metadata(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let entries: Vec<(String, EmbeddingMetadata)> = self
            .metadata
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let raw = serde_json::to_string_pretty(&entries).map_err(CodeSiftError::Serialization)?;
        std::fs::write(self.metadata_path(), raw)?;
        Ok(())
    }
}

fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn write_vector(path: &Path, vector: &[f32]) -> Result<()> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for f in vector {
        bytes.extend_from_slice(&f.to_le_bytes());
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

fn read_vector(path: &Path) -> Result<Vec<f32>> {
    let bytes = std::fs::read(path)?;
    if bytes.len() % 4 != 0 {
        return Err(CodeSiftError::Vector(format!(
            "corrupt vector file {}: length {} not a multiple of 4",
            path.display(),
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_metadata() -> EmbeddingMetadata {
        EmbeddingMetadata {
            source_id: "id-1".into(),
            entity_type: "class".into(),
            file_path: "src/Foo.java".into(),
            start_line: 1,
            end_line: 10,
            content: "class Foo {}".into(),
            language: "java".into(),
            description: None,
            purpose: None,
            capabilities: Vec::new(),
            usage_examples: Vec::new(),
        }
    }

    #[test]
    fn store_then_load_round_trips_metadata() {
        let dir = tempdir().unwrap();
        let ns = Namespace::create("repo-a", dir.path(), 4, 16, 100, 32);
        ns.store("id-1", vec![1.0, 0.0, 0.0, 0.0], sample_metadata()).unwrap();

        let reloaded = Namespace::load("repo-a", dir.path(), 4, 16, 100, 32).unwrap();
        assert_eq!(reloaded.metadata.len(), 1);
        assert_eq!(reloaded.index.len(), 1);
        let results = reloaded.index.search(&[1.0, 0.0, 0.0, 0.0], 1, 0.9);
        assert_eq!(results[0].0, "id-1");
    }

    #[test]
    fn load_prunes_metadata_without_vector_file() {
        let dir = tempdir().unwrap();
        let ns = Namespace::create("repo-a", dir.path(), 4, 16, 100, 32);
        ns.metadata.insert("orphan".into(), sample_metadata());
        ns.persist_metadata().unwrap();

        let reloaded = Namespace::load("repo-a", dir.path(), 4, 16, 100, 32).unwrap();
        assert!(reloaded.metadata.is_empty());
    }
}
