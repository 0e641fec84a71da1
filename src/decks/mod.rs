//! Deck operations for the application layer
//!
//! `Decks` talks to the card store directly. `CachedDecks` adds a
//! look-ahead buffer of due cards kept fresh by a background refresh
//! scheduler, so that the next card is usually available without waiting
//! on the store.

pub mod cache;
pub mod fetch;
pub mod model;
pub mod scheduler;

pub use cache::{CachePhase, CacheSnapshot, CachedDecks};
pub use fetch::{rank_due, DueCardFetcher};
pub use model::{Decks, DecksModel};
pub use scheduler::{RefreshMessage, RefreshScheduler, MIN_REFRESH_INTERVAL};
