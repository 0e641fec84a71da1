//! Flashcard data for Decks
//!
//! This module provides:
//! - The immutable `Card` value (front side, back side, level, last review)
//! - A validating builder for new and derived cards
//! - Clamped level transitions for know / don't-know answers

pub mod models;

pub use models::*;
