//! Revision scheduling for Decks
//!
//! A card's level maps to a delay; the card is due once its last review is
//! at least that delay in the past. The delay table is loaded from a JSON
//! config and is otherwise opaque to the rest of the crate.

pub mod config;
pub mod levels;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::cards::Card;

pub use config::{format_delay, parse_iso_duration, RevisionConfigEntry};
pub use levels::RevisionLevels;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RevisionError {
    #[error("No revision delay configured for level {0}")]
    UnknownLevel(i32),

    #[error("Found two revision level entries with the same level: {0}")]
    DuplicateLevel(i32),

    #[error("Invalid revision delay: {0}")]
    InvalidDelay(String),

    #[error("Revision config defines no levels")]
    NoLevels,

    #[error("Next revision of a level {0} card is out of range")]
    DelayOverflow(i32),
}

pub type Result<T> = std::result::Result<T, RevisionError>;

/// Decides when a card becomes due again.
///
/// Only `min_level`, `max_level` and `delay` are required; the rest is
/// derived from the card's level and last review.
pub trait SchedulingPolicy: Send + Sync {
    fn min_level(&self) -> i32;

    /// Cards at this level are fully learned and never due
    fn max_level(&self) -> i32;

    /// Delay between a review at `level` and the next one
    fn delay(&self, level: i32) -> Result<Duration>;

    fn next_revision(&self, card: &Card) -> Result<DateTime<Utc>> {
        let delay = self.delay(card.level())?;
        card.last_review()
            .checked_add_signed(delay)
            .ok_or(RevisionError::DelayOverflow(card.level()))
    }

    fn is_due_at(&self, card: &Card, now: DateTime<Utc>) -> Result<bool> {
        Ok(now >= self.next_revision(card)?)
    }

    /// How far past due the card is at `now`; negative if not yet due
    fn overtime_at(&self, card: &Card, now: DateTime<Utc>) -> Result<Duration> {
        Ok(now - self.next_revision(card)?)
    }

    fn is_due(&self, card: &Card) -> Result<bool> {
        self.is_due_at(card, Utc::now())
    }

    fn overtime(&self, card: &Card) -> Result<Duration> {
        self.overtime_at(card, Utc::now())
    }
}
