//! Generic repository contract shared by the relational and document
//! backends, plus the error taxonomy every storage operation reports.

use crate::domain::rules::RuleViolation;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Failure taxonomy for storage and domain operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Duplicate(String),
    #[error("caller is not authorized")]
    Unauthorized,
    #[error(transparent)]
    Rule(#[from] RuleViolation),
    #[error("operation was cancelled")]
    Cancelled,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Storage(err.into())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Storage(err.into())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Storage(err.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Bails out with [`StoreError::Cancelled`] once the token has fired.
/// The relational backend calls this at the top of every operation; the
/// document backend never does (its original callers pass no token).
pub fn ensure_live(cancel: &CancellationToken) -> StoreResult<()> {
    if cancel.is_cancelled() {
        return Err(StoreError::Cancelled);
    }
    Ok(())
}

/// A persistable domain entity.
pub trait Entity: Clone + Send + Sync {
    type Id: Clone + PartialEq + Send + Sync + std::fmt::Display;

    /// Singular name used in NotFound messages.
    const NAME: &'static str;

    /// The identifier, absent until the backend assigns one on add.
    fn id(&self) -> Option<Self::Id>;

    /// Entity-specific required-field rules, checked before any write.
    fn validate(&self) -> StoreResult<()>;
}

/// Generic CRUD contract implemented once per entity per backend.
///
/// Tracked reads return an entity whose subsequent `update` will persist
/// relationship collections; untracked reads are cheaper projections.
/// The document backend has no change tracking, so both reads are the
/// same fetch there.
pub trait Repository<E: Entity>: Send + Sync {
    fn get_all(&self, cancel: &CancellationToken) -> StoreResult<Vec<E>>;

    fn get_by_id_tracked(&self, id: &E::Id) -> StoreResult<Option<E>>;

    fn get_by_id_untracked(&self, id: &E::Id) -> StoreResult<Option<E>>;

    /// Validates and inserts, assigning the backend's identifier into
    /// `entity`.
    fn add(&self, entity: &mut E, cancel: &CancellationToken) -> StoreResult<()>;

    /// Validates and persists the full entity state under its id.
    fn update(&self, entity: &E, cancel: &CancellationToken) -> StoreResult<()>;

    fn delete(&self, entity: &E, cancel: &CancellationToken) -> StoreResult<()> {
        match entity.id() {
            Some(id) => self.delete_by_id(&id, cancel),
            None => Err(StoreError::NotFound(E::NAME)),
        }
    }

    fn delete_by_id(&self, id: &E::Id, cancel: &CancellationToken) -> StoreResult<()>;
}

/// A random A-z0-9 string.
pub fn random_string(len: usize) -> String {
    use rand::Rng;
    rand::rng()
        .sample_iter(&rand_distr::Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Rejects empty or whitespace-only required fields.
pub fn require_field(value: &str, field: &'static str) -> StoreResult<()> {
    if value.trim().is_empty() {
        return Err(StoreError::Validation(format!(
            "Field '{}' is required but was empty",
            field
        )));
    }
    Ok(())
}

/// Rejects required fields exceeding the model's maximum length.
pub fn require_max_len(value: &str, field: &'static str, max: usize) -> StoreResult<()> {
    if value.chars().count() > max {
        return Err(StoreError::Validation(format!(
            "Field '{}' exceeds the maximum length of {}",
            field, max
        )));
    }
    Ok(())
}
