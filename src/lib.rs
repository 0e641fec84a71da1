//! Spaced-repetition flashcard decks
//!
//! Cards climb a ladder of revision levels; each level maps to a delay
//! after which the card is due again. The deck lives in a remote store,
//! and [`CachedDecks`] keeps a buffer of due cards ahead of the caller so
//! that the next card is usually available without a round-trip.

pub mod cards;
pub mod config;
pub mod decks;
pub mod error;
pub mod revision;
pub mod store;
pub mod user;

pub use cards::{Card, CardBuilder};
pub use config::{CacheConfig, ConfigError, DecksConfig};
pub use decks::{CachePhase, CacheSnapshot, CachedDecks, Decks, DecksModel, RefreshScheduler};
pub use error::{DecksError, Result};
pub use revision::{RevisionLevels, SchedulingPolicy};
pub use store::{CardStore, FileStore, FirestoreStore, MemoryStore, StoreError};
pub use user::User;
