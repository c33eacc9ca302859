use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use codesift_core::types::{CodeEntity, CodeRelationship};
use codesift_core::{CodeSiftError, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::parser::parse_source;

/// On-disk format version. Bump when the binary layout changes so a future
/// loader can detect and reject a file written by an incompatible version.
const GRAPH_FORMAT_VERSION: u8 = 1;

const SUPPORTED_EXTENSIONS: &[&str] = &["java"];

#[derive(Serialize, Deserialize)]
struct GraphSnapshot {
    entities: Vec<CodeEntity>,
    relationships: Vec<CodeRelationship>,
}

/// Source-derived graph of code entities and relationships (spec §4.5,
/// "Knowledge Graph"). Entities and relationships live in concurrent maps
/// keyed by id; relationships are additionally indexed by source id so
/// traversal does not need a full scan.
pub struct KnowledgeGraph {
    data_path: PathBuf,
    entities: DashMap<String, CodeEntity>,
    relationships_by_source: DashMap<String, Vec<CodeRelationship>>,
    available: AtomicBool,
}

impl KnowledgeGraph {
    /// Loads the graph from `data_dir/knowledge_graph.bin` if present,
    /// otherwise starts empty. Either way, `is_available()` becomes true
    /// once this returns.
    pub fn init(data_dir: &Path) -> Result<Self> {
        let data_path = data_dir.join("knowledge_graph.bin");
        let graph = Self {
            data_path,
            entities: DashMap::new(),
            relationships_by_source: DashMap::new(),
            available: AtomicBool::new(false),
        };

        if graph.data_path.exists() {
            graph.load()?;
        }
        graph.available.store(true, Ordering::Release);
        Ok(graph)
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    fn load(&self) -> Result<()> {
        let bytes = std::fs::read(&self.data_path)?;
        if bytes.is_empty() {
            return Ok(());
        }
        let (version, rest) = bytes.split_first().ok_or_else(|| {
            CodeSiftError::Graph("knowledge graph file is truncated".into())
        })?;
        if *version != GRAPH_FORMAT_VERSION {
            return Err(CodeSiftError::Graph(format!(
                "unsupported knowledge graph format version {}",
                version
            )));
        }
        let (snapshot, _): (GraphSnapshot, usize) =
            bincode::serde::decode_from_slice(rest, bincode::config::standard())
                .map_err(|e| CodeSiftError::Graph(format!("failed to decode knowledge graph: {}", e)))?;

        let ids: HashSet<String> = snapshot.entities.iter().map(|e| e.id.clone()).collect();
        for entity in snapshot.entities {
            self.entities.insert(entity.id.clone(), entity);
        }

        let mut dropped = 0usize;
        for rel in snapshot.relationships {
            if !ids.contains(&rel.source_id) || !ids.contains(&rel.target_id) {
                dropped += 1;
                continue;
            }
            self.relationships_by_source
                .entry(rel.source_id.clone())
                .or_default()
                .push(rel);
        }
        if dropped > 0 {
            warn!(dropped, "dropped orphan relationships referencing unknown entities on load");
        }
        info!(entities = self.entities.len(), "knowledge graph loaded");
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.data_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let snapshot = GraphSnapshot {
            entities: self.entities.iter().map(|e| e.value().clone()).collect(),
            relationships: self
                .relationships_by_source
                .iter()
                .flat_map(|e| e.value().clone())
                .collect(),
        };
        let mut bytes = vec![GRAPH_FORMAT_VERSION];
        bincode::serde::encode_into_std_write(
            &snapshot,
            &mut bytes,
            bincode::config::standard(),
        )
        .map_err(|e| CodeSiftError::Graph(format!("failed to encode knowledge graph: {}", e)))?;
        std::fs::write(&self.data_path, bytes)?;
        Ok(())
    }

    /// Walks `root`, parsing every supported source file, and merges the
    /// resulting entities/relationships into the graph. Saves to disk on
    /// completion (spec §4.5, "Build").
    pub fn build(&self, root: &Path, recursive: bool) -> Result<(usize, usize)> {
        let walker = if recursive {
            WalkDir::new(root)
        } else {
            WalkDir::new(root).max_depth(1)
        };

        let mut entity_count = 0usize;
        let mut relationship_count = 0usize;

        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if !SUPPORTED_EXTENSIONS.contains(&ext) {
                continue;
            }
            let content = match std::fs::read_to_string(entry.path()) {
                Ok(c) => c,
                Err(e) => {
                    warn!(file = %entry.path().display(), error = %e, "skipping unreadable file");
                    continue;
                }
            };
            let parsed = parse_source(entry.path(), &content);
            entity_count += parsed.entities.len();
            relationship_count += parsed.relationships.len();
            for entity in parsed.entities {
                self.entities.insert(entity.id.clone(), entity);
            }
            for rel in parsed.relationships {
                self.relationships_by_source
                    .entry(rel.source_id.clone())
                    .or_default()
                    .push(rel);
            }
        }

        self.save()?;
        Ok((entity_count, relationship_count))
    }

    /// BFS over both outbound and inbound edges up to `depth` hops (spec
    /// §4.5, "find_related").
    pub fn find_related(&self, entity_id: &str, depth: u32) -> Vec<CodeRelationship> {
        let mut visited = HashSet::new();
        visited.insert(entity_id.to_string());
        let mut frontier = VecDeque::new();
        frontier.push_back((entity_id.to_string(), 0u32));
        let mut found = Vec::new();

        while let Some((current, current_depth)) = frontier.pop_front() {
            if current_depth >= depth {
                continue;
            }
            for outbound in self.outbound(&current) {
                if visited.insert(outbound.target_id.clone()) {
                    frontier.push_back((outbound.target_id.clone(), current_depth + 1));
                }
                found.push(outbound);
            }
            for inbound in self.inbound(&current) {
                if visited.insert(inbound.source_id.clone()) {
                    frontier.push_back((inbound.source_id.clone(), current_depth + 1));
                }
                found.push(inbound);
            }
        }
        found
    }

    fn outbound(&self, entity_id: &str) -> Vec<CodeRelationship> {
        self.relationships_by_source
            .get(entity_id)
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    fn inbound(&self, entity_id: &str) -> Vec<CodeRelationship> {
        self.relationships_by_source
            .iter()
            .flat_map(|e| e.value().clone())
            .filter(|r| r.target_id == entity_id)
            .collect()
    }

    /// Case-insensitive substring search over simple and fully-qualified
    /// names, preferring prefix matches (spec §4.5, "search").
    pub fn search(&self, query: &str, max: usize) -> Vec<CodeEntity> {
        let needle = query.to_lowercase();
        let mut matches: Vec<(bool, CodeEntity)> = self
            .entities
            .iter()
            .filter_map(|e| {
                let entity = e.value();
                let simple = entity.simple_name.to_lowercase();
                let fqn = entity.fully_qualified_name.to_lowercase();
                if simple.contains(&needle) || fqn.contains(&needle) {
                    let is_prefix = simple.starts_with(&needle) || fqn.starts_with(&needle);
                    Some((is_prefix, entity.clone()))
                } else {
                    None
                }
            })
            .collect();
        matches.sort_by(|a, b| b.0.cmp(&a.0));
        matches.into_iter().take(max).map(|(_, e)| e).collect()
    }

    /// Returns all entities whose file path matches `path`, normalizing
    /// path separators first.
    pub fn find_by_file_path(&self, path: &str) -> Vec<CodeEntity> {
        let normalized = path.replace('\\', "/");
        self.entities
            .iter()
            .filter(|e| e.value().file_path == normalized)
            .map(|e| e.value().clone())
            .collect()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_source(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn build_then_search_and_related() {
        let src_dir = tempdir().unwrap();
        write_source(
            src_dir.path(),
            "OrderService.java",
            "package com.example;\n\npublic class OrderService {\n    public void placeOrder(String id) {\n    }\n}\n",
        );

        let data_dir = tempdir().unwrap();
        let graph = KnowledgeGraph::init(data_dir.path()).unwrap();
        let (entities, relationships) = graph.build(src_dir.path(), true).unwrap();
        assert_eq!(entities, 2);
        assert_eq!(relationships, 1);
        assert!(graph.is_available());

        let hits = graph.search("orderservice", 10);
        assert_eq!(hits.len(), 1);
        let related = graph.find_related(&hits[0].id, 1);
        assert_eq!(related.len(), 1);

        let by_path = graph.find_by_file_path(&hits[0].file_path);
        assert_eq!(by_path.len(), 2);
    }

    #[test]
    fn reload_recovers_entities_and_drops_orphan_edges() {
        let src_dir = tempdir().unwrap();
        write_source(
            src_dir.path(),
            "Foo.java",
            "package com.example;\n\npublic class Foo {\n    public void bar() {\n    }\n}\n",
        );
        let data_dir = tempdir().unwrap();
        {
            let graph = KnowledgeGraph::init(data_dir.path()).unwrap();
            graph.build(src_dir.path(), true).unwrap();
        }
        let reloaded = KnowledgeGraph::init(data_dir.path()).unwrap();
        assert_eq!(reloaded.entity_count(), 2);
    }
}
