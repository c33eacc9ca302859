pub mod embedding;
pub mod failure;
pub mod index;
pub mod namespace;
pub mod store;

pub use embedding::EmbeddingClient;
pub use failure::FailureRegistry;
pub use index::{cosine_similarity, AnnIndex};
pub use namespace::Namespace;
pub use store::VectorStore;
