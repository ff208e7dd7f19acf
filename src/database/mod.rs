// Database module
// LanceDB holds every chunk with its embedding; there is no separate metadata store

pub mod lancedb;

pub use lancedb::{IndexedVector, RetrievedChunk, VectorIndex};
