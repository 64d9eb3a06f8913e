//! HashRegistry & DocumentStore (§4.J): the content-hash index plus the
//! atomic on-disk document layout it indexes.

pub mod document_store;
pub mod hash_registry;

pub use document_store::DocumentStore;
pub use hash_registry::{doc_hash, HashRegistry};
