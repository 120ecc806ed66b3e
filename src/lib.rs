//! Fonoteca Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod document;
pub mod domain;
pub mod links;
pub mod relational;
pub mod server;
pub mod store;

// Re-export commonly used types for convenience
pub use document::{DocId, DocumentDb};
pub use links::{DocumentLinkService, RelationalLinkService};
pub use relational::{SqlBackend, SqlIdentity};
pub use server::{build_router, run_server, ServerState};
pub use store::{Repository, StoreError};
