pub mod analyzer;
pub mod types;

pub use analyzer::analyze;
pub use types::{
    AccessPattern, ComponentType, ConfigImpactReport, DatabaseOverrideCandidate,
    PropertyFileDefault, PropertyReference, Severity,
};
