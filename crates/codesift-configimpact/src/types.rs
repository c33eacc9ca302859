use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentType {
    Controller,
    Service,
    Repository,
    Configuration,
    Component,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessPattern {
    Direct,
    Fallback,
    Conditional,
    Binding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyReference {
    pub property_name: String,
    pub containing_class: String,
    pub component_type: ComponentType,
    pub critical: bool,
    pub file_path: String,
    pub line_number: u32,
    pub member_name: String,
    pub access_pattern: AccessPattern,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseOverrideCandidate {
    pub repository_interface: String,
    pub file_path: String,
    pub line_number: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyFileDefault {
    pub file_path: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigImpactReport {
    pub property_name: String,
    pub references: Vec<PropertyReference>,
    pub severity: Severity,
    pub database_override_candidates: Vec<DatabaseOverrideCandidate>,
    pub property_file_defaults: Vec<PropertyFileDefault>,
}
