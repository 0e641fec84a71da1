//! Card stores
//!
//! The remote store is the slow, asynchronous side of Decks. Every backend
//! keeps one card collection per user, keyed by the card's front side, and
//! translates cards at its own boundary:
//! - `MemoryStore`: in-process map, used for local sessions and tests
//! - `FileStore`: one JSON document per card on disk
//! - `FirestoreStore`: Firestore REST documents

pub mod file;
pub mod firestore;
pub mod memory;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

use crate::cards::Card;
use crate::user::User;

pub use file::FileStore;
pub use firestore::{FirestoreClient, FirestoreStore};
pub use memory::MemoryStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication failed")]
    AuthFailed,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },

    #[error("Could not decode card: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No user set for the card store")]
    UserNotProvided,

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Lazily produced query results
pub type CardStream = BoxStream<'static, Result<Card>>;

/// Asynchronous card collection of the current user
#[async_trait]
pub trait CardStore: Send + Sync {
    /// Switch the collection subsequent requests operate on
    fn set_user(&self, user: &User);

    /// Cards whose level lies in `[min_inclusive, max_inclusive]`
    async fn query_by_level(&self, min_inclusive: i32, max_inclusive: i32) -> Result<CardStream>;

    /// Insert the card, replacing any card with the same front side
    async fn upsert(&self, card: &Card) -> Result<()>;

    /// Remove the card with the same front side, if any
    async fn delete(&self, card: &Card) -> Result<()>;
}
