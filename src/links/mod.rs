//! Relationship maintenance: follow/unfollow, like/dislike, visit, and
//! the relationship queries, implemented once per backend.
//!
//! Both implementations share the rules in [`crate::domain::rules`]; they
//! differ only in how a link is persisted. The relational side commits a
//! join row in one transaction; the document side performs two
//! independent whole-document replaces and is only eventually symmetric.

pub mod document;
pub mod relational;

pub use document::DocumentLinkService;
pub use relational::RelationalLinkService;
