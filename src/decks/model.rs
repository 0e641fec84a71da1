use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use super::fetch::DueCardFetcher;
use crate::cards::Card;
use crate::error::Result;
use crate::revision::SchedulingPolicy;
use crate::store::CardStore;
use crate::user::User;

/// Operations the application layer performs on a user's deck.
///
/// Implemented by [`Decks`], which asks the store on every call, and by
/// [`super::CachedDecks`], which serves `get_next_card` from a buffer.
#[async_trait]
pub trait DecksModel: Send + Sync {
    /// A new card at the lowest level, reviewed now
    fn create_card(&self, front_side: &str, back_side: &str) -> Result<Card>;

    fn front_side<'a>(&self, card: &'a Card) -> &'a str {
        card.front_side()
    }

    fn back_side<'a>(&self, card: &'a Card) -> &'a str {
        card.back_side()
    }

    /// Insert or replace the card in the current user's deck
    async fn add_card(&self, card: &Card) -> Result<()>;

    async fn delete_card(&self, card: &Card) -> Result<()>;

    /// Record a correct answer and return the stored card
    async fn set_know(&self, card: &Card) -> Result<Card>;

    /// Record a wrong answer and return the stored card
    async fn set_dont_know(&self, card: &Card) -> Result<Card>;

    /// The most overdue card, or `None` when nothing is due
    async fn get_next_card(&self) -> Result<Option<Card>>;

    async fn get_ready_cards(&self) -> Result<Vec<Card>>;

    async fn get_pending_cards(&self) -> Result<Vec<Card>>;

    async fn get_done_cards(&self) -> Result<Vec<Card>>;

    async fn get_all_cards(&self) -> Result<Vec<Card>>;

    /// Switch to another user's deck
    fn set_user(&self, user: &User);
}

/// Deck of the current user, backed directly by the store
pub struct Decks {
    fetcher: DueCardFetcher,
    user: RwLock<User>,
}

impl Decks {
    pub fn new(user: User, policy: Arc<dyn SchedulingPolicy>, store: Arc<dyn CardStore>) -> Self {
        store.set_user(&user);
        Self {
            fetcher: DueCardFetcher::new(store, policy),
            user: RwLock::new(user),
        }
    }

    pub fn user(&self) -> User {
        self.user.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn fetcher(&self) -> &DueCardFetcher {
        &self.fetcher
    }

    async fn store_answer(&self, card: &Card, known: bool) -> Result<Card> {
        let policy = self.fetcher.policy();
        let answered = card.answered(known, policy.min_level(), policy.max_level(), Utc::now());
        self.fetcher.store().upsert(&answered).await?;
        log::debug!(
            "Card {} moved from level {} to {}",
            answered.front_side(),
            card.level(),
            answered.level()
        );
        Ok(answered)
    }
}

#[async_trait]
impl DecksModel for Decks {
    fn create_card(&self, front_side: &str, back_side: &str) -> Result<Card> {
        Card::builder()
            .front_side(front_side)
            .back_side(back_side)
            .level(self.fetcher.policy().min_level())
            .last_review(Utc::now())
            .build()
    }

    async fn add_card(&self, card: &Card) -> Result<()> {
        self.fetcher.store().upsert(card).await?;
        Ok(())
    }

    async fn delete_card(&self, card: &Card) -> Result<()> {
        self.fetcher.store().delete(card).await?;
        Ok(())
    }

    async fn set_know(&self, card: &Card) -> Result<Card> {
        self.store_answer(card, true).await
    }

    async fn set_dont_know(&self, card: &Card) -> Result<Card> {
        self.store_answer(card, false).await
    }

    async fn get_next_card(&self) -> Result<Option<Card>> {
        Ok(self.fetcher.fetch_ready().await?.into_iter().next())
    }

    async fn get_ready_cards(&self) -> Result<Vec<Card>> {
        self.fetcher.fetch_ready().await
    }

    async fn get_pending_cards(&self) -> Result<Vec<Card>> {
        self.fetcher.fetch_pending().await
    }

    async fn get_done_cards(&self) -> Result<Vec<Card>> {
        self.fetcher.fetch_done().await
    }

    async fn get_all_cards(&self) -> Result<Vec<Card>> {
        self.fetcher.fetch_all().await
    }

    fn set_user(&self, user: &User) {
        self.fetcher.store().set_user(user);
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = user.clone();
        log::info!("Switched decks to {}", user);
    }
}
