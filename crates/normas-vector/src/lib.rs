//! LanceDB-backed vector index over document chunks.
//!
//! One `chunks` table holds text, source metadata and embeddings; a small
//! key/value `meta` table records the format version, the embedder identity and
//! dimension, and a fingerprint of the chunk set the index was built from.

pub mod index;
pub mod schema;
pub mod table;

pub use index::{fingerprint, IndexOptions, VectorIndex};
