//! Look-ahead card cache
//!
//! `CachedDecks` keeps a buffer of due cards in memory so that
//! `get_next_card` answers without a store round-trip. The buffer is
//! refilled in the background:
//! - when a pop leaves fewer than `min_size` cards behind,
//! - on every refresh scheduler tick,
//! - when a caller finds the buffer empty.
//!
//! At most one refill runs at a time. Triggers that arrive while one is in
//! flight share it instead of starting another. After a user switch the
//! new user's refill waits for the abandoned one to finish before it
//! queries the store. A landing refill replaces
//! the buffer with the fresh due list minus the cards already handed out,
//! then serves the callers that were waiting on it in arrival order.

use std::collections::{HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::fetch::DueCardFetcher;
use super::model::{Decks, DecksModel};
use super::scheduler::{start_refresh_scheduler, RefreshScheduler};
use crate::cards::Card;
use crate::config::CacheConfig;
use crate::error::{DecksError, Result};
use crate::revision::SchedulingPolicy;
use crate::store::CardStore;
use crate::user::User;

type RefillFuture = Shared<BoxFuture<'static, Result<()>>>;
type Waiter = oneshot::Sender<Result<Option<Card>>>;

/// Where the cache stands between two operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePhase {
    Empty,
    EmptyRefilling,
    BelowWatermark,
    BelowWatermarkRefilling,
    Ready,
    ReadyRefilling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSnapshot {
    pub buffered: usize,
    pub refill_in_flight: bool,
    /// Callers blocked on the in-flight refill
    pub waiting: usize,
    pub phase: CachePhase,
}

struct Refill {
    id: u64,
    generation: u64,
    done: RefillFuture,
    task: JoinHandle<Result<()>>,
}

impl Refill {
    fn is_live(&self) -> bool {
        !self.task.is_finished()
    }
}

#[derive(Default)]
struct CacheState {
    buffer: VecDeque<Card>,
    inflight: Option<Refill>,
    waiters: VecDeque<Waiter>,
    /// Cards handed out since they were last fetched
    delivered: HashSet<Card>,
    next_refill_id: u64,
    /// Bumped on user switch; refills started under an older value are dropped
    generation: u64,
}

impl CacheState {
    fn pop_front(&mut self) -> Option<Card> {
        let card = self.buffer.pop_front()?;
        self.delivered.insert(card.clone());
        Some(card)
    }

    fn unpop(&mut self, card: Card) {
        self.delivered.remove(&card);
        self.buffer.push_front(card);
    }

    fn live_refill(&self) -> Option<&Refill> {
        self.inflight.as_ref().filter(|refill| refill.is_live())
    }

    /// Replace the buffer with `cards`, leaving out the ones already handed out
    fn swap_in(&mut self, cards: Vec<Card>) {
        let fetched: HashSet<&Card> = cards.iter().collect();
        self.delivered.retain(|card| fetched.contains(card));

        let delivered = &self.delivered;
        self.buffer = cards.into_iter().filter(|card| !delivered.contains(card)).collect();
    }

    /// Hand buffered cards to waiting callers, oldest caller first.
    ///
    /// Returns how many cards left the buffer.
    fn serve_waiters(&mut self) -> usize {
        let mut served = 0;
        while let Some(waiter) = self.waiters.pop_front() {
            if waiter.is_closed() {
                continue;
            }
            let card = self.pop_front();
            let has_card = card.is_some();
            match waiter.send(Ok(card)) {
                Ok(()) if has_card => served += 1,
                Err(Ok(Some(card))) => self.unpop(card),
                _ => {}
            }
        }
        served
    }

    fn fail_waiters(&mut self, err: &DecksError) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Err(err.clone()));
        }
    }
}

pub(super) struct CacheCore {
    state: Mutex<CacheState>,
    fetcher: DueCardFetcher,
    min_size: usize,
}

impl CacheCore {
    fn new(fetcher: DueCardFetcher, min_size: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            fetcher,
            min_size,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for a refill to land, starting one unless one is already running.
    pub(super) async fn refill(self: &Arc<Self>) -> Result<()> {
        let done = {
            let mut state = self.lock();
            self.ensure_refill(&mut state)
        };
        done.await
    }

    fn ensure_refill(self: &Arc<Self>, state: &mut CacheState) -> RefillFuture {
        // A live refill from before a user switch is not reused, only waited on
        let abandoned = match state.live_refill() {
            Some(refill) if refill.generation == state.generation => return refill.done.clone(),
            Some(refill) => Some(refill.done.clone()),
            None => None,
        };

        let id = state.next_refill_id;
        state.next_refill_id += 1;
        let generation = state.generation;

        let core = Arc::clone(self);
        let done = async move {
            if let Some(abandoned) = abandoned {
                let _ = abandoned.await;
            }
            let fetched = AssertUnwindSafe(core.fetcher.fetch_ready()).catch_unwind().await;
            let result = fetched.unwrap_or(Err(DecksError::RefillInterrupted));
            core.land(id, generation, result)
        }
        .boxed()
        .shared();

        log::debug!("Card cache: refill {} started", id);
        let task = tokio::spawn(done.clone());
        state.inflight = Some(Refill {
            id,
            generation,
            done: done.clone(),
            task,
        });
        done
    }

    fn check_low_water(self: &Arc<Self>, state: &mut CacheState) {
        if state.buffer.len() < self.min_size && state.live_refill().is_none() {
            log::debug!(
                "Card cache: {} card(s) left, below {}",
                state.buffer.len(),
                self.min_size
            );
            let _ = self.ensure_refill(state);
        }
    }

    fn land(self: &Arc<Self>, id: u64, generation: u64, result: Result<Vec<Card>>) -> Result<()> {
        let mut state = self.lock();
        if state.inflight.as_ref().map_or(false, |refill| refill.id == id) {
            state.inflight = None;
        }
        if state.generation != generation {
            log::debug!("Card cache: discarding refill {} started for another user", id);
            return Ok(());
        }

        match result {
            Ok(cards) => {
                let fetched = cards.len();
                state.swap_in(cards);
                log::debug!(
                    "Card cache: refill {} landed with {} due card(s), {} buffered",
                    id,
                    fetched,
                    state.buffer.len()
                );

                // Only re-check once cards were handed out; an empty due
                // list must not trigger another fetch.
                if state.serve_waiters() > 0 {
                    self.check_low_water(&mut state);
                }
                Ok(())
            }
            Err(err) => {
                log::warn!("Card cache: refill {} failed: {}", id, err);
                state.fail_waiters(&err);
                Err(err)
            }
        }
    }

    async fn next_card(self: &Arc<Self>) -> Result<Option<Card>> {
        let receiver = {
            let mut state = self.lock();
            if let Some(card) = state.pop_front() {
                self.check_low_water(&mut state);
                return Ok(Some(card));
            }

            let (sender, receiver) = oneshot::channel();
            state.waiters.push_back(sender);
            let _ = self.ensure_refill(&mut state);
            receiver
        };

        receiver.await.unwrap_or(Err(DecksError::RefillInterrupted))
    }

    fn reset(self: &Arc<Self>) {
        let mut state = self.lock();
        state.generation += 1;
        state.buffer.clear();
        state.delivered.clear();
        if !state.waiters.is_empty() {
            let _ = self.ensure_refill(&mut state);
        }
    }

    fn forget_delivered(&self, card: &Card) {
        self.lock().delivered.remove(card);
    }

    fn snapshot(&self) -> CacheSnapshot {
        let state = self.lock();
        let buffered = state.buffer.len();
        let refill_in_flight = state.live_refill().is_some();
        let phase = match (buffered, refill_in_flight) {
            (0, false) => CachePhase::Empty,
            (0, true) => CachePhase::EmptyRefilling,
            (n, false) if n < self.min_size => CachePhase::BelowWatermark,
            (n, true) if n < self.min_size => CachePhase::BelowWatermarkRefilling,
            (_, false) => CachePhase::Ready,
            (_, true) => CachePhase::ReadyRefilling,
        };
        CacheSnapshot {
            buffered,
            refill_in_flight,
            waiting: state.waiters.len(),
            phase,
        }
    }
}

/// Deck with a look-ahead buffer of due cards.
///
/// Everything except `get_next_card` goes straight to the store.
/// Construction spawns the refresh scheduler, so it has to happen inside a
/// tokio runtime.
pub struct CachedDecks {
    decks: Decks,
    core: Arc<CacheCore>,
    scheduler: RefreshScheduler,
}

impl CachedDecks {
    pub fn new(
        user: User,
        policy: Arc<dyn SchedulingPolicy>,
        store: Arc<dyn CardStore>,
        config: &CacheConfig,
    ) -> Self {
        Self::with_decks(Decks::new(user, policy, store), config)
    }

    pub fn with_decks(decks: Decks, config: &CacheConfig) -> Self {
        let core = Arc::new(CacheCore::new(decks.fetcher().clone(), config.min_size));
        let scheduler = start_refresh_scheduler(
            Arc::downgrade(&core),
            config.refresh_interval(),
            config.warm_on_start,
        );
        Self {
            decks,
            core,
            scheduler,
        }
    }

    /// Fetch due cards now and replace the buffer with them.
    ///
    /// Joins the refill already in flight, if any.
    pub async fn refill(&self) -> Result<()> {
        self.core.refill().await
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        self.core.snapshot()
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    pub fn user(&self) -> User {
        self.decks.user()
    }
}

#[async_trait]
impl DecksModel for CachedDecks {
    fn create_card(&self, front_side: &str, back_side: &str) -> Result<Card> {
        self.decks.create_card(front_side, back_side)
    }

    async fn add_card(&self, card: &Card) -> Result<()> {
        self.decks.add_card(card).await?;
        self.core.forget_delivered(card);
        Ok(())
    }

    async fn delete_card(&self, card: &Card) -> Result<()> {
        self.decks.delete_card(card).await
    }

    async fn set_know(&self, card: &Card) -> Result<Card> {
        self.decks.set_know(card).await
    }

    async fn set_dont_know(&self, card: &Card) -> Result<Card> {
        self.decks.set_dont_know(card).await
    }

    async fn get_next_card(&self) -> Result<Option<Card>> {
        self.core.next_card().await
    }

    async fn get_ready_cards(&self) -> Result<Vec<Card>> {
        self.decks.get_ready_cards().await
    }

    async fn get_pending_cards(&self) -> Result<Vec<Card>> {
        self.decks.get_pending_cards().await
    }

    async fn get_done_cards(&self) -> Result<Vec<Card>> {
        self.decks.get_done_cards().await
    }

    async fn get_all_cards(&self) -> Result<Vec<Card>> {
        self.decks.get_all_cards().await
    }

    fn set_user(&self, user: &User) {
        self.decks.set_user(user);
        self.core.reset();
    }
}
