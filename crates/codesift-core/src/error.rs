use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodeSiftError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Vector store error: {0}")]
    Vector(String),

    #[error("Knowledge graph error: {0}")]
    Graph(String),

    #[error("Cross-repository search error: {0}")]
    CrossRepo(String),

    #[error("Configuration-impact analysis error: {0}")]
    ConfigImpact(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("External service error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, CodeSiftError>;
