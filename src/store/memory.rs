use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};

use super::{CardStore, CardStream, Result, StoreError};
use crate::cards::Card;
use crate::user::User;

/// In-process card store
#[derive(Debug, Default)]
pub struct MemoryStore {
    user: RwLock<Option<User>>,
    /// user name → front side → card
    decks: Mutex<HashMap<String, BTreeMap<String, Card>>>,
    queries: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_user(user: User) -> Self {
        let store = Self::new();
        store.set_user(&user);
        store
    }

    /// Number of `query_by_level` calls served so far
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// All cards of the current user, ordered by front side
    pub fn cards(&self) -> Result<Vec<Card>> {
        let user = self.current_user()?;
        Ok(self
            .decks()
            .get(user.name())
            .map(|deck| deck.values().cloned().collect())
            .unwrap_or_default())
    }

    fn current_user(&self) -> Result<User> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(StoreError::UserNotProvided)
    }

    fn decks(&self) -> MutexGuard<'_, HashMap<String, BTreeMap<String, Card>>> {
        self.decks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CardStore for MemoryStore {
    fn set_user(&self, user: &User) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = Some(user.clone());
    }

    async fn query_by_level(&self, min_inclusive: i32, max_inclusive: i32) -> Result<CardStream> {
        let user = self.current_user()?;
        self.queries.fetch_add(1, Ordering::SeqCst);

        let cards: Vec<Card> = self
            .decks()
            .get(user.name())
            .map(|deck| {
                deck.values()
                    .filter(|card| (min_inclusive..=max_inclusive).contains(&card.level()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(stream::iter(cards.into_iter().map(Ok)).boxed())
    }

    async fn upsert(&self, card: &Card) -> Result<()> {
        let user = self.current_user()?;
        self.decks()
            .entry(user.name().to_string())
            .or_default()
            .insert(card.front_side().to_string(), card.clone());
        Ok(())
    }

    async fn delete(&self, card: &Card) -> Result<()> {
        let user = self.current_user()?;
        if let Some(deck) = self.decks().get_mut(user.name()) {
            deck.remove(card.front_side());
        }
        Ok(())
    }
}
