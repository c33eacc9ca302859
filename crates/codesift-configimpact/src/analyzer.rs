use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use codesift_core::config::ConfigImpactConfig;
use codesift_core::Result;
use regex::Regex;
use walkdir::WalkDir;

use crate::types::{
    AccessPattern, ComponentType, ConfigImpactReport, DatabaseOverrideCandidate,
    PropertyFileDefault, PropertyReference, Severity,
};

fn class_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:class|interface)\s+(\w+)").unwrap())
}

fn package_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*package\s+([\w.]+)\s*;").unwrap())
}

fn value_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"@Value\(\s*"\$\{([\w.\-]+)(?::[^}]*)?\}"\s*\)"#).unwrap())
}

fn environment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"environment\.getProperty\(\s*"([\w.\-]+)""#).unwrap())
}

fn properties_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"properties\.(?:getProperty|get)\(\s*"([\w.\-]+)""#).unwrap())
}

fn configuration_properties_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"@ConfigurationProperties\(\s*(?:prefix\s*=\s*)?"([\w.\-]+)"\s*\)"#).unwrap())
}

fn conditional_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"@Conditional(?:OnProperty|OnBean)\([^)]*"([\w.\-]+)"[^)]*\)"#).unwrap()
    })
}

fn repository_finder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"interface\s+(\w*(?:Config|Setting|Option)\w*)").unwrap())
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

fn field_decl_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?x)
            ^\s*
            (?:(?:private|protected|public|final|static)\s+)+
            [\w<>\[\],.\s]+?\s+
            (\w+)
            \s*[=;]
            ",
        )
        .unwrap()
    })
}

const CONTROL_FLOW_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "try", "synchronized", "return", "new",
];

const CRITICAL_MARKERS: &[&str] = &["security", "auth", "core", "persistence"];

/// Finds the field name a `@Value` annotation injects into: the annotation
/// line itself for one-liners, otherwise the next field declaration.
fn field_name_near(lines: &[&str], idx: usize) -> Option<String> {
    if let Some(caps) = field_decl_regex().captures(lines[idx]) {
        return Some(caps[1].to_string());
    }
    for line in lines.iter().skip(idx + 1).take(3) {
        if let Some(caps) = field_decl_regex().captures(line.trim()) {
            return Some(caps[1].to_string());
        }
    }
    None
}

fn matches_property(name: &str, target: &str) -> bool {
    if let Some(prefix) = target.strip_suffix('*') {
        name.starts_with(prefix)
    } else {
        name == target
    }
}

fn leaf_name(target: &str) -> String {
    target.trim_end_matches('*').rsplit('.').next().unwrap_or(target).to_string()
}

struct FileScanState {
    package: String,
    current_class: String,
    current_method: String,
    component_type: ComponentType,
    critical: bool,
}

fn infer_component_type(annotations: &[&str], class_name: &str) -> ComponentType {
    if annotations.iter().any(|a| a.contains("RestController") || a.contains("@Controller")) {
        ComponentType::Controller
    } else if annotations.iter().any(|a| a.contains("@Service")) || class_name.ends_with("Service") {
        ComponentType::Service
    } else if annotations.iter().any(|a| a.contains("@Repository")) || class_name.ends_with("Repository") {
        ComponentType::Repository
    } else if annotations.iter().any(|a| a.contains("@Configuration")) || class_name.ends_with("Config") {
        ComponentType::Configuration
    } else if annotations.iter().any(|a| a.contains("@Component")) {
        ComponentType::Component
    } else {
        ComponentType::Other
    }
}

fn is_critical(package: &str, class_name: &str) -> bool {
    let lower_pkg = package.to_lowercase();
    let lower_class = class_name.to_lowercase();
    CRITICAL_MARKERS
        .iter()
        .any(|m| lower_pkg.contains(m) || lower_class.contains(m))
}

fn scan_file(
    path: &Path,
    content: &str,
    target: &str,
    references: &mut Vec<PropertyReference>,
    db_candidates: &mut Vec<DatabaseOverrideCandidate>,
) {
    let file_path = path.to_string_lossy().replace('\\', "/");
    let mut state = FileScanState {
        package: String::new(),
        current_class: String::new(),
        current_method: String::new(),
        component_type: ComponentType::Other,
        critical: false,
    };
    let mut pending_annotations: Vec<String> = Vec::new();
    let mut in_loop_depth = 0i32;
    let lines: Vec<&str> = content.lines().collect();

    for (idx, line) in lines.iter().enumerate() {
        let line_no = (idx + 1) as u32;
        let trimmed = line.trim();

        if let Some(caps) = package_regex().captures(trimmed) {
            state.package = caps[1].to_string();
            continue;
        }

        if trimmed.starts_with("for ") || trimmed.starts_with("for(") || trimmed.starts_with("while ") || trimmed.starts_with("while(") {
            in_loop_depth += 1;
        }
        if trimmed == "}" && in_loop_depth > 0 {
            in_loop_depth -= 1;
        }

        if let Some(caps) = class_regex().captures(trimmed) {
            state.current_class = caps[1].to_string();
            state.component_type = infer_component_type(
                &pending_annotations.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
                &state.current_class,
            );
            state.critical = is_critical(&state.package, &state.current_class);
            pending_annotations.clear();
        } else if let Some(caps) = method_decl_regex().captures(trimmed) {
            let name = caps[1].to_string();
            if !CONTROL_FLOW_KEYWORDS.contains(&name.as_str()) {
                state.current_method = name;
            }
        }

        if let Some(caps) = repository_finder_regex().captures(trimmed) {
            let leaf = leaf_name(target);
            if content.to_lowercase().contains(&leaf.to_lowercase()) {
                db_candidates.push(DatabaseOverrideCandidate {
                    repository_interface: caps[1].to_string(),
                    file_path: file_path.clone(),
                    line_number: line_no,
                });
            }
        }

        if trimmed.starts_with('@') {
            pending_annotations.push(trimmed.to_string());
        }

        let method_or_class = || {
            if state.current_method.is_empty() {
                state.current_class.clone()
            } else {
                state.current_method.clone()
            }
        };

        let mut push_ref = |property_name: &str, access_pattern: AccessPattern, member_name: String| {
            if matches_property(property_name, target) {
                references.push(PropertyReference {
                    property_name: property_name.to_string(),
                    containing_class: if state.package.is_empty() {
                        state.current_class.clone()
                    } else {
                        format!("{}.{}", state.package, state.current_class)
                    },
                    component_type: state.component_type,
                    critical: state.critical || in_loop_depth > 0,
                    file_path: file_path.clone(),
                    line_number: line_no,
                    member_name,
                    access_pattern,
                });
            }
        };

        if let Some(caps) = value_regex().captures(trimmed) {
            let member = field_name_near(&lines, idx).unwrap_or_else(|| state.current_class.clone());
            push_ref(&caps[1], AccessPattern::Direct, member);
        }
        if let Some(caps) = environment_regex().captures(trimmed) {
            push_ref(&caps[1], AccessPattern::Direct, method_or_class());
        }
        if let Some(caps) = properties_regex().captures(trimmed) {
            push_ref(&caps[1], AccessPattern::Fallback, method_or_class());
        }
        if let Some(caps) = configuration_properties_regex().captures(trimmed) {
            push_ref(&caps[1], AccessPattern::Binding, state.current_class.clone());
        }
        if let Some(caps) = conditional_regex().captures(trimmed) {
            push_ref(&caps[1], AccessPattern::Conditional, method_or_class());
        }
    }
}

fn score_severity(references: &[PropertyReference]) -> Severity {
    if references.iter().any(|r| r.critical || r.access_pattern == AccessPattern::Conditional) {
        return Severity::High;
    }
    let distinct_classes: HashSet<&str> = references.iter().map(|r| r.containing_class.as_str()).collect();
    if distinct_classes.len() > 5 {
        return Severity::Medium;
    }
    Severity::Low
}

fn resolve_property_file_defaults(
    resource_paths: &[String],
    target: &str,
) -> Vec<PropertyFileDefault> {
    let leaf = leaf_name(target);
    let mut defaults = Vec::new();
    for root in resource_paths {
        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let ext = entry.path().extension().and_then(|e| e.to_str());
            if !matches!(ext, Some("properties") | Some("yml") | Some("yaml")) {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            for line in content.lines() {
                let trimmed = line.trim();
                if let Some((key, value)) = trimmed.split_once('=').or_else(|| trimmed.split_once(':')) {
                    let key = key.trim();
                    if matches_property(key, target) || key.ends_with(&leaf) {
                        defaults.push(PropertyFileDefault {
                            file_path: entry.path().to_string_lossy().replace('\\', "/"),
                            value: value.trim().to_string(),
                        });
                    }
                }
            }
        }
    }
    defaults
}

/// Finds every place `property_name` (or a `prefix*` wildcard) is read,
/// bound, or conditionally switched on under `source_roots`, and rates the
/// blast radius (spec §4.8).
pub fn analyze(
    config: &ConfigImpactConfig,
    source_roots: &[String],
    property_name: &str,
) -> Result<ConfigImpactReport> {
    let mut references = Vec::new();
    let mut db_candidates = Vec::new();

    for root in source_roots {
        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension().and_then(|e| e.to_str()) != Some("java") {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            scan_file(entry.path(), &content, property_name, &mut references, &mut db_candidates);
        }
    }

    let severity = score_severity(&references);
    let property_file_defaults = resolve_property_file_defaults(&config.resource_paths, property_name);

    Ok(ConfigImpactReport {
        property_name: property_name.to_string(),
        references,
        severity,
        database_override_candidates: db_candidates,
        property_file_defaults,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn detects_value_injection_and_flags_critical_package() {
        let root = tempdir().unwrap();
        std::fs::write(
            root.path().join("AuthService.java"),
            r#"package com.example.security;

@Service
public class AuthService {
    @Value("${auth.timeout.seconds}")
    private int timeoutSeconds;
}
"#,
        )
        .unwrap();

        let config = ConfigImpactConfig { resource_paths: vec![] };
        let report = analyze(
            &config,
            &[root.path().to_string_lossy().into_owned()],
            "auth.timeout.seconds",
        )
        .unwrap();

        assert_eq!(report.references.len(), 1);
        assert!(report.references[0].critical);
        assert_eq!(report.references[0].member_name, "timeoutSeconds");
        assert_eq!(report.severity, Severity::High);
    }

    #[test]
    fn wildcard_prefix_matches_and_resolves_property_file_default() {
        let src_root = tempdir().unwrap();
        std::fs::write(
            src_root.path().join("FeatureFlags.java"),
            r#"package com.example.flags;

@Component
public class FeatureFlags {
    @Value("${feature.new-ui.enabled}")
    private boolean enabled;
}
"#,
        )
        .unwrap();

        let resource_root = tempdir().unwrap();
        std::fs::write(
            resource_root.path().join("application.properties"),
            "feature.new-ui.enabled=false\n",
        )
        .unwrap();

        let config = ConfigImpactConfig {
            resource_paths: vec![resource_root.path().to_string_lossy().into_owned()],
        };
        let report = analyze(
            &config,
            &[src_root.path().to_string_lossy().into_owned()],
            "feature.*",
        )
        .unwrap();

        assert_eq!(report.references.len(), 1);
        assert_eq!(report.references[0].member_name, "enabled");
        assert_eq!(report.property_file_defaults.len(), 1);
        assert_eq!(report.property_file_defaults[0].value, "false");
    }

    #[test]
    fn captures_method_name_for_environment_lookup() {
        let root = tempdir().unwrap();
        std::fs::write(
            root.path().join("ConfigService.java"),
            r#"package com.example.config;

@Service
public class ConfigService {
    public String resolveTimeout() {
        return environment.getProperty("auth.timeout.seconds");
    }
}
"#,
        )
        .unwrap();

        let config = ConfigImpactConfig { resource_paths: vec![] };
        let report = analyze(
            &config,
            &[root.path().to_string_lossy().into_owned()],
            "auth.timeout.seconds",
        )
        .unwrap();

        assert_eq!(report.references.len(), 1);
        assert_eq!(report.references[0].member_name, "resolveTimeout");
    }
}
