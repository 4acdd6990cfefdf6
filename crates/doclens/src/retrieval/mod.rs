//! Vector retrieval

pub mod index;

pub use index::{cosine_similarity, IndexEntry, ScoredChunk, VectorIndex};
