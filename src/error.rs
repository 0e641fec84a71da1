use std::sync::Arc;

use thiserror::Error;

use crate::revision::RevisionError;
use crate::store::StoreError;

/// Errors surfaced to the application layer.
///
/// Cloneable so a single failed refill can be reported to every caller
/// that was waiting on it.
#[derive(Error, Debug, Clone)]
pub enum DecksError {
    #[error("Store request failed: {0}")]
    Store(Arc<StoreError>),

    #[error("Revision policy error: {0}")]
    Revision(#[from] RevisionError),

    #[error("Invalid card: {0}")]
    InvalidCard(String),

    #[error("Refill stopped before producing a result")]
    RefillInterrupted,
}

impl From<StoreError> for DecksError {
    fn from(err: StoreError) -> Self {
        Self::Store(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, DecksError>;
