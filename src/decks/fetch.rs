use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures_util::TryStreamExt;

use crate::cards::Card;
use crate::error::Result;
use crate::revision::SchedulingPolicy;
use crate::store::CardStore;

/// Queries the store and orders the result with the scheduling policy.
#[derive(Clone)]
pub struct DueCardFetcher {
    store: Arc<dyn CardStore>,
    policy: Arc<dyn SchedulingPolicy>,
}

impl DueCardFetcher {
    pub fn new(store: Arc<dyn CardStore>, policy: Arc<dyn SchedulingPolicy>) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &Arc<dyn CardStore> {
        &self.store
    }

    pub fn policy(&self) -> &Arc<dyn SchedulingPolicy> {
        &self.policy
    }

    /// Cards due for review, most overdue first.
    ///
    /// Learned cards (at the maximum level) are never queried.
    pub async fn fetch_ready(&self) -> Result<Vec<Card>> {
        let cards = self.active_cards().await?;
        rank_due(self.policy.as_ref(), cards, Utc::now())
    }

    /// Active cards that are not due yet, the next one to become due first
    pub async fn fetch_pending(&self) -> Result<Vec<Card>> {
        let cards = self.active_cards().await?;
        rank(self.policy.as_ref(), cards, Utc::now(), false)
    }

    /// Fully learned cards
    pub async fn fetch_done(&self) -> Result<Vec<Card>> {
        self.query(self.policy.max_level(), i32::MAX).await
    }

    pub async fn fetch_all(&self) -> Result<Vec<Card>> {
        self.query(i32::MIN, i32::MAX).await
    }

    async fn active_cards(&self) -> Result<Vec<Card>> {
        let max_active = self.policy.max_level().saturating_sub(1);
        self.query(self.policy.min_level(), max_active).await
    }

    async fn query(&self, min_inclusive: i32, max_inclusive: i32) -> Result<Vec<Card>> {
        let cards = self
            .store
            .query_by_level(min_inclusive, max_inclusive)
            .await?
            .try_collect::<Vec<_>>()
            .await?;
        Ok(cards)
    }
}

/// Keep the cards due at `now`, most overdue first.
///
/// Cards with equal overtime keep their store order.
pub fn rank_due(policy: &dyn SchedulingPolicy, cards: Vec<Card>, now: DateTime<Utc>) -> Result<Vec<Card>> {
    rank(policy, cards, now, true)
}

fn rank(policy: &dyn SchedulingPolicy, cards: Vec<Card>, now: DateTime<Utc>, due: bool) -> Result<Vec<Card>> {
    let mut ranked: Vec<(Duration, Card)> = Vec::with_capacity(cards.len());
    for card in cards {
        if policy.is_due_at(&card, now)? == due {
            let overtime = policy.overtime_at(&card, now)?;
            ranked.push((overtime, card));
        }
    }
    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(ranked.into_iter().map(|(_, card)| card).collect())
}
