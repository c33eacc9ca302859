use std::path::Path;

use codesift_core::hashing::stable_hash;
use codesift_core::types::{CodeEntity, CodeRelationship, EntityType, RelationshipType};
use regex::Regex;
use std::sync::OnceLock;

fn package_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*package\s+([\w.]+)\s*;").unwrap())
}

fn type_decl_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?x)
            ^\s*
            (?:(?:public|private|protected|abstract|final|static)\s+)*
            (class|interface)\s+
            (\w+)
            (?:<[^>]*>)?
            (?:\s+extends\s+([\w<>,.\s]+?))?
            (?:\s+implements\s+([\w<>,.\s]+?))?
            \s*\{?\s*$
            ",
        )
        .unwrap()
    })
}

fn method_decl_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?x)
            ^\s*
            (?:(?:public|private|protected|static|final|abstract|synchronized|native|default)\s+)*
            (?:[\w<>\[\],.\s]+?\s+)
            (\w+)
            \s*\(([^)]*)\)
            \s*(?:throws\s+[\w.,\s]+)?
            \s*\{?\s*$
            ",
        )
        .unwrap()
    })
}

const CONTROL_FLOW_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "try", "synchronized", "return", "new",
];

/// Result of parsing a single source file: the entities and relationships
/// it produced.
pub struct ParsedFile {
    pub entities: Vec<CodeEntity>,
    pub relationships: Vec<CodeRelationship>,
}

/// Line-scan parser for Java-style source, mirroring the detection rules
/// for class/interface declarations, method declarations, and
/// extends/implements relations.
pub fn parse_source(file_path: &Path, content: &str) -> ParsedFile {
    let file_path_str = file_path.to_string_lossy().replace('\\', "/");
    let package = content
        .lines()
        .find_map(|line| package_regex().captures(line).map(|c| c[1].to_string()))
        .unwrap_or_default();

    let mut entities = Vec::new();
    let mut relationships = Vec::new();
    let mut current_type: Option<(String, usize)> = None;

    for (idx, line) in content.lines().enumerate() {
        let line_no = (idx + 1) as u32;
        let trimmed = line.trim();

        if let Some(caps) = type_decl_regex().captures(trimmed) {
            let kind = if &caps[1] == "interface" {
                EntityType::Interface
            } else {
                EntityType::Class
            };
            let simple_name = caps[2].to_string();
            let fqn = if package.is_empty() {
                simple_name.clone()
            } else {
                format!("{}.{}", package, simple_name)
            };
            let id = stable_hash(&[&fqn, kind.as_str(), &file_path_str]);

            entities.push(CodeEntity {
                id: id.clone(),
                simple_name: simple_name.clone(),
                fully_qualified_name: fqn,
                entity_type: kind,
                file_path: file_path_str.clone(),
                start_line: line_no,
                end_line: line_no,
            });

            if let Some(extends) = caps.get(3) {
                for target in split_type_list(extends.as_str()) {
                    relationships.push(relation_to_synthetic_target(
                        &id,
                        &target,
                        RelationshipType::Extends,
                    ));
                }
            }
            if let Some(implements) = caps.get(4) {
                for target in split_type_list(implements.as_str()) {
                    relationships.push(relation_to_synthetic_target(
                        &id,
                        &target,
                        RelationshipType::Implements,
                    ));
                }
            }

            current_type = Some((id, entities.len() - 1));
            continue;
        }

        if let Some((owner_id, _)) = &current_type {
            if let Some(caps) = method_decl_regex().captures(trimmed) {
                let name = caps[1].to_string();
                if CONTROL_FLOW_KEYWORDS.contains(&name.as_str()) {
                    continue;
                }
                let owner_fqn = entities
                    .iter()
                    .find(|e| &e.id == owner_id)
                    .map(|e| e.fully_qualified_name.clone())
                    .unwrap_or_default();
                let fqn = format!("{}.{}", owner_fqn, name);
                let id = stable_hash(&[&fqn, EntityType::Method.as_str(), &file_path_str]);

                entities.push(CodeEntity {
                    id: id.clone(),
                    simple_name: name,
                    fully_qualified_name: fqn,
                    entity_type: EntityType::Method,
                    file_path: file_path_str.clone(),
                    start_line: line_no,
                    end_line: line_no,
                });
                relationships.push(CodeRelationship {
                    source_id: owner_id.clone(),
                    target_id: id,
                    relationship_type: RelationshipType::Contains,
                    properties: Default::default(),
                });
            }
        }
    }

    ParsedFile {
        entities,
        relationships,
    }
}

fn split_type_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.split('<').next().unwrap_or(s).trim().to_string())
        .collect()
}

/// Relations to a type named only by its simple name get a synthetic id
/// that may be resolved to the real entity once it is encountered.
fn relation_to_synthetic_target(
    source_id: &str,
    target_simple_name: &str,
    relationship_type: RelationshipType,
) -> CodeRelationship {
    let synthetic_target = stable_hash(&["synthetic", target_simple_name]);
    CodeRelationship {
        source_id: source_id.to_string(),
        target_id: synthetic_target,
        relationship_type,
        properties: [("target_simple_name".to_string(), target_simple_name.to_string())]
            .into_iter()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_class_with_method_and_package() {
        let source = r#"
package com.example.service;

public class OrderService extends BaseService implements Auditable {
    public void placeOrder(String id) {
        System.out.println(id);
    }
}
"#;
        let parsed = parse_source(Path::new("src/OrderService.java"), source);
        let class = parsed
            .entities
            .iter()
            .find(|e| e.entity_type == EntityType::Class)
            .unwrap();
        assert_eq!(class.fully_qualified_name, "com.example.service.OrderService");

        let method = parsed
            .entities
            .iter()
            .find(|e| e.entity_type == EntityType::Method)
            .unwrap();
        assert_eq!(method.simple_name, "placeOrder");

        assert!(parsed
            .relationships
            .iter()
            .any(|r| r.relationship_type == RelationshipType::Contains
                && r.source_id == class.id
                && r.target_id == method.id));
        assert!(parsed
            .relationships
            .iter()
            .any(|r| r.relationship_type == RelationshipType::Extends));
        assert!(parsed
            .relationships
            .iter()
            .any(|r| r.relationship_type == RelationshipType::Implements));
    }

    #[test]
    fn ignores_control_flow_statements_as_methods() {
        let source = r#"
package com.example;

public class Loop {
    public void run() {
        if (true) {
        }
    }
}
"#;
        let parsed = parse_source(Path::new("src/Loop.java"), source);
        let methods: Vec<_> = parsed
            .entities
            .iter()
            .filter(|e| e.entity_type == EntityType::Method)
            .collect();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].simple_name, "run");
    }
}
