//! Document backend: JSON-file collections with embedded, two-way
//! relationship id lists and no transactional guarantees.

pub mod collection;
pub mod doc_id;
pub mod models;
pub mod store;

pub use collection::{DocCollection, Document};
pub use doc_id::DocId;
pub use store::{sha256_hash, DocumentDb};
