//! Revision config entries and delay notation
//!
//! The config is an array of entries, each assigning one delay to a list of
//! levels:
//!
//! ```json
//! [
//!   { "delayToRevision": "PT1M", "levels": [0] },
//!   { "delayToRevision": "PT1H", "levels": [1] },
//!   { "delayToRevision": "P1D",  "levels": [2, 3, 4, 5, 6, 7, 8] }
//! ]
//! ```
//!
//! Delays use ISO-8601 duration notation (`PnW`, `PnDTnHnMn.nS`).

use chrono::Duration;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{Result, RevisionError, RevisionLevels};

/// One entry of the revision config
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionConfigEntry {
    /// ISO-8601 delay applied to every level in `levels`
    pub delay_to_revision: String,
    pub levels: Vec<i32>,
}

impl RevisionLevels {
    /// Expand config entries into a level table
    pub fn from_entries(entries: &[RevisionConfigEntry]) -> Result<Self> {
        let mut pairs = Vec::new();
        for entry in entries {
            let delay = parse_iso_duration(&entry.delay_to_revision)?;
            for level in &entry.levels {
                pairs.push((*level, delay));
            }
        }
        Self::new(pairs)
    }
}

/// Parse an ISO-8601 duration such as `PT1M`, `P1D`, `P2W` or `PT1.5S`
pub fn parse_iso_duration(text: &str) -> Result<Duration> {
    let re = Regex::new(
        r"^P(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(?:[.,](\d{1,9}))?S)?)?$",
    )
    .map_err(|e| RevisionError::InvalidDelay(e.to_string()))?;

    let normalized = text.trim().to_ascii_uppercase();
    let invalid = || RevisionError::InvalidDelay(text.to_string());

    // "P" and "PT" match the pattern but carry no amount
    if normalized == "P" || normalized.ends_with('T') {
        return Err(invalid());
    }
    let caps = re.captures(&normalized).ok_or_else(invalid)?;

    let number = |index: usize| -> Result<i64> {
        match caps.get(index) {
            Some(m) => m.as_str().parse::<i64>().map_err(|_| invalid()),
            None => Ok(0),
        }
    };

    let nanos = match caps.get(6) {
        Some(m) => {
            let digits = format!("{:0<9}", m.as_str());
            digits.parse::<i64>().map_err(|_| invalid())?
        }
        None => 0,
    };

    let parts = [
        Duration::try_weeks(number(1)?),
        Duration::try_days(number(2)?),
        Duration::try_hours(number(3)?),
        Duration::try_minutes(number(4)?),
        Duration::try_seconds(number(5)?),
        Some(Duration::nanoseconds(nanos)),
    ];

    parts.into_iter().try_fold(Duration::zero(), |total, part| {
        part.and_then(|p| total.checked_add(&p)).ok_or_else(invalid)
    })
}

/// Format a delay as a short human-readable string ("1m", "6h", "2w", ...)
pub fn format_delay(delay: Duration) -> String {
    let seconds = delay.num_seconds();
    if seconds <= 0 {
        "now".to_string()
    } else if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m", seconds / 60)
    } else if seconds < 86_400 {
        format!("{}h", seconds / 3600)
    } else {
        let days = seconds / 86_400;
        if days < 7 {
            format!("{}d", days)
        } else if days < 30 {
            format!("{}w", days / 7)
        } else if days < 365 {
            format!("{}mo", days / 30)
        } else {
            format!("{}y", days / 365)
        }
    }
}
