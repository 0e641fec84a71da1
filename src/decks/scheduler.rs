use std::sync::Weak;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::cache::CacheCore;

/// Shortest period between two scheduled refills
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Messages to control the refresh scheduler
#[derive(Debug)]
pub enum RefreshMessage {
    /// Refill now instead of waiting for the next tick
    RefreshNow,
    Shutdown,
}

/// Handle for the periodic cache refresh
pub struct RefreshScheduler {
    sender: mpsc::Sender<RefreshMessage>,
}

impl RefreshScheduler {
    pub fn refresh_now(&self) {
        let _ = self.sender.try_send(RefreshMessage::RefreshNow);
    }

    /// Stop the loop. Dropping the cache stops it as well.
    pub fn shutdown(&self) {
        let _ = self.sender.try_send(RefreshMessage::Shutdown);
    }

    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// Start refilling the cache every `interval`.
///
/// The loop holds only a weak reference to the cache and ends once the
/// cache is gone. With `refresh_immediately` the first refill happens right
/// away instead of after one interval.
pub(super) fn start_refresh_scheduler(
    cache: Weak<CacheCore>,
    interval: Duration,
    refresh_immediately: bool,
) -> RefreshScheduler {
    let (tx, rx) = mpsc::channel(32);
    let interval = interval.max(MIN_REFRESH_INTERVAL);

    tokio::spawn(async move {
        refresh_loop(cache, interval, refresh_immediately, rx).await;
    });

    RefreshScheduler { sender: tx }
}

async fn refresh_loop(
    cache: Weak<CacheCore>,
    interval: Duration,
    refresh_immediately: bool,
    mut rx: mpsc::Receiver<RefreshMessage>,
) {
    log::info!("Refresh scheduler: started, refilling every {}s", interval.as_secs());

    let start = if refresh_immediately {
        Instant::now()
    } else {
        Instant::now() + interval
    };
    let mut ticker = time::interval_at(start, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !refresh(&cache, "scheduled", &mut rx).await {
                    break;
                }
            }
            msg = rx.recv() => {
                match msg {
                    Some(RefreshMessage::RefreshNow) => {
                        if !refresh(&cache, "requested", &mut rx).await {
                            break;
                        }
                    }
                    Some(RefreshMessage::Shutdown) | None => {
                        log::info!("Refresh scheduler: shutting down");
                        break;
                    }
                }
            }
        }
    }
}

/// Wait for one refill while still taking messages.
///
/// Returns false once the loop should stop: the cache was dropped, or a
/// shutdown arrived while the refill was pending.
async fn refresh(
    cache: &Weak<CacheCore>,
    reason: &str,
    rx: &mut mpsc::Receiver<RefreshMessage>,
) -> bool {
    let Some(cache) = cache.upgrade() else {
        log::info!("Refresh scheduler: cache dropped, stopping");
        return false;
    };

    log::debug!("Refresh scheduler: {} refill", reason);
    let refill = cache.refill();
    tokio::pin!(refill);

    loop {
        tokio::select! {
            result = &mut refill => {
                if let Err(e) = result {
                    log::warn!("Refresh scheduler: {} refill failed: {}", reason, e);
                }
                return true;
            }
            msg = rx.recv() => {
                match msg {
                    Some(RefreshMessage::RefreshNow) => {
                        log::debug!("Refresh scheduler: refill already pending");
                    }
                    Some(RefreshMessage::Shutdown) | None => {
                        log::info!("Refresh scheduler: shutting down during {} refill", reason);
                        return false;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::cards::Card;
    use crate::config::CacheConfig;
    use crate::decks::{CachePhase, CachedDecks, DecksModel};
    use crate::revision::RevisionLevels;
    use crate::store::{CardStore, CardStream, MemoryStore, Result as StoreResult, StoreError};
    use crate::user::User;

    fn due_card(front: &str) -> Card {
        Card::builder()
            .front_side(front)
            .back_side("back")
            .level(0)
            .last_review(Utc::now() - chrono::Duration::hours(1))
            .build()
            .unwrap()
    }

    async fn setup(warm_on_start: bool) -> (CachedDecks, Arc<MemoryStore>) {
        let _ = env_logger::builder().is_test(true).try_init();
        let store = Arc::new(MemoryStore::for_user(User::new("coden")));
        store.upsert(&due_card("a")).await.unwrap();
        store.upsert(&due_card("b")).await.unwrap();

        let config = CacheConfig {
            min_size: 2,
            refresh_interval_minutes: 1,
            warm_on_start,
        };
        let cache = CachedDecks::new(
            User::new("coden"),
            Arc::new(RevisionLevels::standard()),
            store.clone(),
            &config,
        );
        (cache, store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_refills_on_every_tick() {
        let (cache, store) = setup(false).await;

        time_passes(Duration::from_secs(30)).await;
        assert_eq!(store.query_count(), 0);

        time_passes(Duration::from_secs(31)).await;
        assert_eq!(store.query_count(), 1);
        assert_eq!(cache.snapshot().buffered, 2);

        time_passes(Duration::from_secs(60)).await;
        assert_eq!(store.query_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_warm_start_refills_immediately() {
        let (cache, store) = setup(true).await;

        time_passes(Duration::from_millis(10)).await;
        assert_eq!(store.query_count(), 1);
        assert_eq!(cache.snapshot().phase, CachePhase::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_now_skips_the_wait() {
        let (cache, store) = setup(false).await;

        cache.scheduler().refresh_now();
        time_passes(Duration::from_millis(10)).await;
        assert_eq!(store.query_count(), 1);

        let card = cache.get_next_card().await.unwrap().unwrap();
        assert_eq!(card.front_side(), "a");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_ticks() {
        let (cache, store) = setup(false).await;

        cache.scheduler().shutdown();
        time_passes(Duration::from_secs(1)).await;
        assert!(!cache.scheduler().is_running());

        time_passes(Duration::from_secs(180)).await;
        assert_eq!(store.query_count(), 0);
    }

    /// Store that is never reachable
    #[derive(Default)]
    struct DownStore {
        queries: AtomicUsize,
    }

    #[async_trait]
    impl CardStore for DownStore {
        fn set_user(&self, _user: &User) {}

        async fn query_by_level(&self, _min: i32, _max: i32) -> StoreResult<CardStream> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Unavailable("offline".to_string()))
        }

        async fn upsert(&self, _card: &Card) -> StoreResult<()> {
            Err(StoreError::Unavailable("offline".to_string()))
        }

        async fn delete(&self, _card: &Card) -> StoreResult<()> {
            Err(StoreError::Unavailable("offline".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refill_keeps_scheduler_alive() {
        let _ = env_logger::builder().is_test(true).try_init();
        let store = Arc::new(DownStore::default());
        let cache = CachedDecks::new(
            User::new("coden"),
            Arc::new(RevisionLevels::standard()),
            store.clone(),
            &CacheConfig {
                min_size: 2,
                refresh_interval_minutes: 1,
                warm_on_start: true,
            },
        );

        time_passes(Duration::from_secs(125)).await;
        assert_eq!(store.queries.load(Ordering::SeqCst), 3);
        assert!(cache.scheduler().is_running());
        assert_eq!(cache.snapshot().phase, CachePhase::Empty);
    }

    /// Store whose queries never answer
    struct HangingStore;

    #[async_trait]
    impl CardStore for HangingStore {
        fn set_user(&self, _user: &User) {}

        async fn query_by_level(&self, _min: i32, _max: i32) -> StoreResult<CardStream> {
            std::future::pending().await
        }

        async fn upsert(&self, _card: &Card) -> StoreResult<()> {
            Ok(())
        }

        async fn delete(&self, _card: &Card) -> StoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_while_refill_hangs() {
        let _ = env_logger::builder().is_test(true).try_init();
        let cache = CachedDecks::new(
            User::new("coden"),
            Arc::new(RevisionLevels::standard()),
            Arc::new(HangingStore),
            &CacheConfig {
                min_size: 2,
                refresh_interval_minutes: 1,
                warm_on_start: true,
            },
        );

        time_passes(Duration::from_millis(10)).await;
        assert!(cache.snapshot().refill_in_flight);
        assert!(cache.scheduler().is_running());

        cache.scheduler().shutdown();
        time_passes(Duration::from_secs(1)).await;
        assert!(!cache.scheduler().is_running());
    }

    async fn time_passes(duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
