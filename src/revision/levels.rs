use std::collections::BTreeMap;

use chrono::Duration;

use super::{Result, RevisionError, SchedulingPolicy};

/// Level → delay table backing the default scheduling policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionLevels {
    delays: BTreeMap<i32, Duration>,
}

impl RevisionLevels {
    /// Build a table from `(level, delay)` pairs. Levels must be unique.
    pub fn new(levels: impl IntoIterator<Item = (i32, Duration)>) -> Result<Self> {
        let mut delays = BTreeMap::new();
        for (level, delay) in levels {
            if delays.insert(level, delay).is_some() {
                return Err(RevisionError::DuplicateLevel(level));
            }
        }
        if delays.is_empty() {
            return Err(RevisionError::NoLevels);
        }
        Ok(Self { delays })
    }

    /// 0 → 1 minute, 1 → 1 hour, 2..=8 → 1 day, 9 → 1 week, 10 → 2 weeks
    pub fn standard() -> Self {
        let mut delays = BTreeMap::new();
        delays.insert(0, Duration::minutes(1));
        delays.insert(1, Duration::hours(1));
        for level in 2..=8 {
            delays.insert(level, Duration::days(1));
        }
        delays.insert(9, Duration::weeks(1));
        delays.insert(10, Duration::weeks(2));
        Self { delays }
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, Duration)> + '_ {
        self.delays.iter().map(|(level, delay)| (*level, *delay))
    }

    pub fn len(&self) -> usize {
        self.delays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }
}

impl Default for RevisionLevels {
    fn default() -> Self {
        Self::standard()
    }
}

impl SchedulingPolicy for RevisionLevels {
    fn min_level(&self) -> i32 {
        self.delays.keys().next().copied().unwrap_or(0)
    }

    fn max_level(&self) -> i32 {
        self.delays.keys().next_back().copied().unwrap_or(0)
    }

    fn delay(&self, level: i32) -> Result<Duration> {
        self.delays
            .get(&level)
            .copied()
            .ok_or(RevisionError::UnknownLevel(level))
    }
}
