//! Data models for the flashcard system

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DecksError, Result};

/// A flashcard with a front side (shown) and a back side (hidden).
///
/// Cards are values: every review produces a new card that replaces the old
/// one in the store. The front side doubles as the card's key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    front_side: String,
    back_side: String,
    level: i32,
    last_review: DateTime<Utc>,
}

impl Card {
    /// Start building a card from scratch
    pub fn builder() -> CardBuilder {
        CardBuilder::default()
    }

    /// Create a fresh card at the given level, reviewed now
    pub fn new(front_side: impl Into<String>, back_side: impl Into<String>, level: i32) -> Result<Self> {
        Self::builder()
            .front_side(front_side)
            .back_side(back_side)
            .level(level)
            .last_review(Utc::now())
            .build()
    }

    pub fn front_side(&self) -> &str {
        &self.front_side
    }

    pub fn back_side(&self) -> &str {
        &self.back_side
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn last_review(&self) -> DateTime<Utc> {
        self.last_review
    }

    /// The card after an answer: one level up if known, one level down
    /// otherwise, kept within `[min_level, max_level]` and reviewed at `now`
    pub fn answered(&self, known: bool, min_level: i32, max_level: i32, now: DateTime<Utc>) -> Card {
        let level = if known {
            self.level.saturating_add(1)
        } else {
            self.level.saturating_sub(1)
        };
        Card {
            level: level.max(min_level).min(max_level),
            last_review: now,
            ..self.clone()
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Card<{}:{}>", self.front_side, self.back_side)
    }
}

/// Builder for [`Card`]. Every field must be set before `build`.
#[derive(Debug, Clone, Default)]
pub struct CardBuilder {
    front_side: Option<String>,
    back_side: Option<String>,
    level: Option<i32>,
    last_review: Option<DateTime<Utc>>,
}

impl CardBuilder {
    pub fn front_side(mut self, front_side: impl Into<String>) -> Self {
        self.front_side = Some(front_side.into());
        self
    }

    pub fn back_side(mut self, back_side: impl Into<String>) -> Self {
        self.back_side = Some(back_side.into());
        self
    }

    pub fn level(mut self, level: i32) -> Self {
        self.level = Some(level);
        self
    }

    pub fn last_review(mut self, last_review: DateTime<Utc>) -> Self {
        self.last_review = Some(last_review);
        self
    }

    pub fn build(self) -> Result<Card> {
        let front_side = self
            .front_side
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DecksError::InvalidCard("front side must not be empty".to_string()))?;
        let back_side = self
            .back_side
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DecksError::InvalidCard("back side must not be empty".to_string()))?;
        let level = self
            .level
            .ok_or_else(|| DecksError::InvalidCard("level has to be specified".to_string()))?;
        let last_review = self
            .last_review
            .ok_or_else(|| DecksError::InvalidCard("last review has to be specified".to_string()))?;

        Ok(Card {
            front_side,
            back_side,
            level,
            last_review,
        })
    }
}

impl From<&Card> for CardBuilder {
    fn from(card: &Card) -> Self {
        Self {
            front_side: Some(card.front_side.clone()),
            back_side: Some(card.back_side.clone()),
            level: Some(card.level),
            last_review: Some(card.last_review),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn card(level: i32) -> Card {
        Card::builder()
            .front_side("einsehen")
            .back_side("to realize")
            .level(level)
            .last_review(Utc::now() - Duration::hours(1))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_level() {
        let err = Card::builder()
            .front_side("front")
            .back_side("back")
            .last_review(Utc::now())
            .build()
            .unwrap_err();
        assert!(matches!(err, DecksError::InvalidCard(_)));
    }

    #[test]
    fn test_builder_rejects_empty_sides() {
        let result = Card::builder()
            .front_side("")
            .back_side("back")
            .level(0)
            .last_review(Utc::now())
            .build();
        assert!(result.is_err());

        let result = Card::builder()
            .front_side("front")
            .back_side("")
            .level(0)
            .last_review(Utc::now())
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_from_card_overrides() {
        let original = card(3);
        let copy = CardBuilder::from(&original)
            .front_side("15 Minutes")
            .build()
            .unwrap();

        assert_eq!(copy.front_side(), "15 Minutes");
        assert_eq!(copy.back_side(), original.back_side());
        assert_eq!(copy.level(), 3);
        assert_eq!(copy.last_review(), original.last_review());
    }

    #[test]
    fn test_known_moves_up_and_is_clamped() {
        let now = Utc::now();
        let up = card(5).answered(true, 0, 10, now);
        assert_eq!(up.level(), 6);
        assert_eq!(up.last_review(), now);
        assert_eq!(up.front_side(), "einsehen");

        assert_eq!(card(10).answered(true, 0, 10, now).level(), 10);
    }

    #[test]
    fn test_unknown_moves_down_and_is_clamped() {
        let now = Utc::now();
        let original = card(0);
        let down = original.answered(false, 0, 10, now);
        assert_eq!(down.level(), 0);
        assert!(down.last_review() > original.last_review());

        assert_eq!(card(4).answered(false, 0, 10, now).level(), 3);
    }

    #[test]
    fn test_out_of_range_level_is_pulled_back() {
        let now = Utc::now();
        assert_eq!(card(-3).answered(true, 0, 10, now).level(), 0);
        assert_eq!(card(14).answered(false, 0, 10, now).level(), 10);
    }

    #[test]
    fn test_serde_camel_case() {
        let json = serde_json::to_value(card(2)).unwrap();
        assert_eq!(json["frontSide"], "einsehen");
        assert_eq!(json["backSide"], "to realize");
        assert_eq!(json["level"], 2);
        assert!(json.get("lastReview").is_some());
    }

    #[test]
    fn test_display() {
        assert_eq!(card(0).to_string(), "Card<einsehen:to realize>");
    }
}
