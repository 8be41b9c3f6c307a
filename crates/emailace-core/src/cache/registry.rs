//! Keyed query cache with coalesced fetches, polling and invalidation.

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use emailace_api::TransportError;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::key::QueryKey;
use super::snapshot::{AnyValue, CacheSnapshot, CacheStatus, EntryState};
use crate::time::{Clock, SystemClock};

type ErasedFetcher =
    Arc<dyn Fn() -> BoxFuture<'static, Result<AnyValue, TransportError>> + Send + Sync>;

struct Entry {
    /// Distinguishes this incarnation from a later one under the same key.
    id: u64,
    state: watch::Sender<EntryState>,
    fetcher: ErasedFetcher,
    /// Poll period each subscriber asked for.
    subscribers: HashMap<u64, Option<Duration>>,
    /// Set while a fetch is outstanding. An entry whose last subscriber left
    /// mid-fetch stays until the fetch lands, so a returning subscriber
    /// attaches to it instead of issuing a second request.
    in_flight: bool,
    /// Set when invalidated mid-fetch: the in-flight result is dropped and
    /// one more fetch follows.
    refetch_queued: bool,
    poll_interval: Option<Duration>,
    poller: Option<JoinHandle<()>>,
}

struct Inner {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    next_id: AtomicU64,
    clock: Arc<dyn Clock>,
}

/// Process-wide keyed cache of query results.
///
/// Cloning is cheap; clones share one registry. Entries live as long as they
/// have subscribers or a fetch in flight. Dropping the last handle stops all
/// polling.
///
/// Requires a tokio runtime: fetches and pollers are spawned tasks.
#[derive(Clone)]
pub struct FetchCache {
    inner: Arc<Inner>,
}

impl Default for FetchCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FetchCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCache")
            .field("keys", &self.keys())
            .finish()
    }
}

impl FetchCache {
    /// Creates an empty cache stamped by the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty cache stamped by `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                clock,
            }),
        }
    }

    /// Subscribes to `key`.
    ///
    /// The first subscription to an unseen key creates the entry and starts
    /// `fetcher` (idle → loading). Later subscriptions attach to the existing
    /// entry and never start a second concurrent fetch; their `fetcher` is
    /// ignored. With `poll_interval`, the entry is refetched on that period;
    /// the shortest interval among current subscribers wins, and a zero
    /// interval asks for no polling.
    ///
    /// `fetcher` only builds the request future and must not call back into
    /// the cache.
    pub fn subscribe<T, F, Fut>(
        &self,
        key: QueryKey,
        fetcher: F,
        poll_interval: Option<Duration>,
    ) -> Subscription<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, TransportError>> + Send + 'static,
    {
        let subscriber_id = self.inner.next_id();
        let mut entries = self.inner.lock();

        let entry = entries.entry(key.clone()).or_insert_with(|| {
            debug!("cache: creating entry {key}");
            Entry {
                id: self.inner.next_id(),
                state: watch::Sender::new(EntryState::idle()),
                fetcher: erase(fetcher),
                subscribers: HashMap::new(),
                in_flight: false,
                refetch_queued: false,
                poll_interval: None,
                poller: None,
            }
        });
        entry
            .subscribers
            .insert(subscriber_id, poll_interval.filter(|d| !d.is_zero()));
        let receiver = entry.state.subscribe();

        if entry.state.borrow().status == CacheStatus::Idle {
            self.inner
                .start_fetch(&key, entry, Some(CacheStatus::Loading));
        }
        self.inner.reschedule_poller(&key, entry);
        drop(entries);

        Subscription {
            key,
            subscriber_id,
            receiver,
            cache: Arc::downgrade(&self.inner),
            _value: PhantomData,
        }
    }

    /// Marks `key` stale and refetches it if anyone is subscribed.
    ///
    /// Without subscribers there is no entry to refresh, so the next
    /// subscription fetches from scratch.
    pub fn invalidate(&self, key: &QueryKey) -> usize {
        self.invalidate_matching(|candidate| candidate == key)
    }

    /// Invalidates every key for which `predicate` holds. Returns how many
    /// entries were invalidated.
    pub fn invalidate_matching(&self, predicate: impl Fn(&QueryKey) -> bool) -> usize {
        let mut entries = self.inner.lock();
        let mut count = 0;
        for (key, entry) in entries.iter_mut() {
            if !predicate(key) {
                continue;
            }
            count += 1;
            entry.state.send_modify(|state| {
                if matches!(state.status, CacheStatus::Fresh | CacheStatus::Error) {
                    state.status = CacheStatus::Stale;
                }
            });
            if entry.in_flight {
                entry.refetch_queued = true;
                debug!("cache: {key} invalidated mid-fetch, refetch queued");
            } else {
                debug!("cache: {key} invalidated");
                self.inner.start_fetch(key, entry, None);
            }
        }
        count
    }

    /// Refetches `key` without marking it stale. Coalesces with any fetch
    /// already in flight. Returns false if nobody is subscribed to `key`.
    pub fn refresh(&self, key: &QueryKey) -> bool {
        let mut entries = self.inner.lock();
        match entries.get_mut(key) {
            Some(entry) if !entry.subscribers.is_empty() => {
                self.inner.start_fetch(key, entry, None);
                true
            }
            _ => false,
        }
    }

    /// Reads `key` without subscribing.
    #[must_use]
    pub fn peek<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<CacheSnapshot<T>> {
        let entries = self.inner.lock();
        entries
            .get(key)
            .map(|entry| CacheSnapshot::from_state(&entry.state.borrow()))
    }

    /// Status of `key`, if it has an entry.
    #[must_use]
    pub fn status(&self, key: &QueryKey) -> Option<CacheStatus> {
        let entries = self.inner.lock();
        entries.get(key).map(|entry| entry.state.borrow().status)
    }

    /// Number of live subscriptions to `key`.
    #[must_use]
    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        let entries = self.inner.lock();
        entries.get(key).map_or(0, |entry| entry.subscribers.len())
    }

    /// Keys that currently have an entry, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<QueryKey> {
        let entries = self.inner.lock();
        let mut keys: Vec<_> = entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Starts a fetch for `entry` unless one is already in flight.
    fn start_fetch(
        self: &Arc<Self>,
        key: &QueryKey,
        entry: &mut Entry,
        transition: Option<CacheStatus>,
    ) {
        if entry.in_flight {
            debug!("cache: {key} already fetching, coalesced");
            return;
        }
        entry.in_flight = true;
        entry.state.send_modify(|state| {
            if let Some(status) = transition {
                state.status = status;
            }
            state.fetching = true;
        });

        let request = (entry.fetcher)();
        let cache = Arc::downgrade(self);
        let key = key.clone();
        let incarnation = entry.id;
        tokio::spawn(async move {
            let result = request.await;
            if let Some(cache) = cache.upgrade() {
                cache.complete(&key, incarnation, result);
            }
        });
    }

    fn complete(
        self: &Arc<Self>,
        key: &QueryKey,
        incarnation: u64,
        result: Result<AnyValue, TransportError>,
    ) {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key).filter(|entry| entry.id == incarnation) else {
            debug!("cache: {key} was dropped, discarding response");
            return;
        };
        entry.in_flight = false;

        if entry.subscribers.is_empty() {
            entries.remove(key);
            debug!("cache: nobody left for {key}, dropping entry");
            return;
        }

        if entry.refetch_queued {
            entry.refetch_queued = false;
            self.start_fetch(key, entry, None);
            return;
        }

        match result {
            Ok(value) => {
                let now = self.clock.now();
                entry.state.send_modify(|state| {
                    state.status = CacheStatus::Fresh;
                    state.value = Some(value);
                    state.error = None;
                    state.updated_at = Some(now);
                    state.fetching = false;
                });
                debug!("cache: {key} fresh");
            }
            Err(error) => {
                warn!("cache: fetching {key} failed: {error}");
                entry.state.send_modify(|state| {
                    state.status = CacheStatus::Error;
                    state.error = Some(error);
                    state.fetching = false;
                });
            }
        }
    }

    /// Polls at the shortest period any current subscriber asked for, or
    /// not at all.
    fn reschedule_poller(self: &Arc<Self>, key: &QueryKey, entry: &mut Entry) {
        let wanted = entry.subscribers.values().flatten().min().copied();
        if wanted == entry.poll_interval {
            return;
        }
        if let Some(poller) = entry.poller.take() {
            poller.abort();
        }
        entry.poll_interval = wanted;
        let Some(interval) = wanted else {
            debug!("cache: stopped polling {key}");
            return;
        };
        debug!("cache: polling {key} every {interval:?}");

        let cache = Arc::downgrade(self);
        let key = key.clone();
        let incarnation = entry.id;
        entry.poller = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else { break };
                if !cache.poll(&key, incarnation) {
                    break;
                }
            }
        }));
    }

    /// One poll tick. Returns false once the entry is gone.
    fn poll(self: &Arc<Self>, key: &QueryKey, incarnation: u64) -> bool {
        let mut entries = self.lock();
        match entries.get_mut(key).filter(|entry| entry.id == incarnation) {
            Some(entry) => {
                self.start_fetch(key, entry, None);
                true
            }
            None => false,
        }
    }

    fn unsubscribe(self: &Arc<Self>, key: &QueryKey, subscriber_id: u64) {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        if entry.subscribers.remove(&subscriber_id).is_none() {
            return;
        }
        self.reschedule_poller(key, entry);
        if !entry.subscribers.is_empty() {
            return;
        }
        if entry.in_flight {
            debug!("cache: last subscriber left {key}, keeping it until its fetch lands");
            return;
        }
        entries.remove(key);
        debug!("cache: last subscriber left {key}, dropping entry");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let entries = self.entries.get_mut().unwrap_or_else(PoisonError::into_inner);
        for entry in entries.values_mut() {
            if let Some(poller) = entry.poller.take() {
                poller.abort();
            }
        }
    }
}

fn erase<T, F, Fut>(fetcher: F) -> ErasedFetcher
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, TransportError>> + Send + 'static,
{
    Arc::new(move || {
        fetcher()
            .map(|result| result.map(|value| Arc::new(value) as AnyValue))
            .boxed()
    })
}

/// A live interest in one cache key.
///
/// Dropping the subscription unsubscribes and withdraws its poll period. The
/// last subscriber leaving stops polling and destroys the entry; a fetch
/// already in flight is not cancelled, and the entry lingers until it lands
/// so that a new subscriber picks up that response rather than asking again.
pub struct Subscription<T> {
    key: QueryKey,
    subscriber_id: u64,
    receiver: watch::Receiver<EntryState>,
    cache: Weak<Inner>,
    _value: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("subscriber_id", &self.subscriber_id)
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> Subscription<T> {
    /// The subscribed key.
    #[must_use]
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }

    /// The entry as it is right now.
    #[must_use]
    pub fn snapshot(&self) -> CacheSnapshot<T> {
        CacheSnapshot::from_state(&self.receiver.borrow())
    }

    /// Waits for the next change to the entry.
    ///
    /// Returns `None` if the cache itself has been torn down.
    pub async fn changed(&mut self) -> Option<CacheSnapshot<T>> {
        self.receiver.changed().await.ok()?;
        Some(CacheSnapshot::from_state(&self.receiver.borrow_and_update()))
    }

    /// Waits until nothing is in flight and the entry is fresh or errored.
    pub async fn settled(&mut self) -> CacheSnapshot<T> {
        loop {
            let snapshot = CacheSnapshot::from_state(&self.receiver.borrow_and_update());
            if snapshot.is_settled() || self.receiver.changed().await.is_err() {
                return snapshot;
            }
        }
    }

    /// How long ago the entry last fetched successfully, by the cache's clock.
    ///
    /// `None` before the first success or once the cache is gone.
    #[must_use]
    pub fn age(&self) -> Option<chrono::Duration> {
        let updated_at = self.receiver.borrow().updated_at?;
        let cache = self.cache.upgrade()?;
        Some(cache.clock.since(updated_at))
    }

    /// Explicitly ends the subscription.
    pub fn unsubscribe(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(cache) = self.cache.upgrade() {
            cache.unsubscribe(&self.key, self.subscriber_id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use chrono::{TimeZone, Utc};
    use tokio::sync::Semaphore;

    use super::*;
    use crate::time::ManualClock;

    /// Fake backend: counts requests, fails the first `failures` of them and
    /// answers each only once a permit is available.
    struct Backend {
        calls: AtomicUsize,
        failures: usize,
        gate: Semaphore,
    }

    impl Backend {
        fn open() -> Arc<Self> {
            Self::gated(Semaphore::MAX_PERMITS)
        }

        fn gated(permits: usize) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                failures: 0,
                gate: Semaphore::new(permits),
            })
        }

        fn failing_first(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                failures,
                gate: Semaphore::new(Semaphore::MAX_PERMITS),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn fetcher(
            self: &Arc<Self>,
        ) -> impl Fn() -> BoxFuture<'static, Result<usize, TransportError>> + Send + Sync + 'static
        {
            let backend = Arc::clone(self);
            move || {
                let n = backend.calls.fetch_add(1, Ordering::SeqCst) + 1;
                let backend = Arc::clone(&backend);
                async move {
                    backend.gate.acquire().await.unwrap().forget();
                    if n <= backend.failures {
                        Err(TransportError::status(500))
                    } else {
                        Ok(n)
                    }
                }
                .boxed()
            }
        }
    }

    #[tokio::test]
    async fn test_concurrent_subscribers_share_one_fetch() {
        let cache = FetchCache::new();
        let backend = Backend::gated(0);

        let mut first = cache.subscribe(QueryKey::Emails, backend.fetcher(), None);
        let mut second = cache.subscribe(QueryKey::Emails, backend.fetcher(), None);
        assert_eq!(first.snapshot().status(), CacheStatus::Loading);
        assert_eq!(cache.subscriber_count(&QueryKey::Emails), 2);

        backend.gate.add_permits(1);
        let a = first.settled().await;
        let b = second.settled().await;

        assert_eq!(backend.calls(), 1);
        assert_eq!(a.data(), Some(&1));
        assert!(Arc::ptr_eq(&a.data_arc().unwrap(), &b.data_arc().unwrap()));
    }

    #[tokio::test]
    async fn test_invalidation_mid_fetch_discards_in_flight_result() {
        let cache = FetchCache::new();
        let backend = Backend::gated(0);
        let mut emails = cache.subscribe(QueryKey::Emails, backend.fetcher(), None);

        assert_eq!(cache.invalidate(&QueryKey::Emails), 1);
        assert_eq!(backend.calls(), 1);

        backend.gate.add_permits(1);
        while backend.calls() < 2 {
            emails.changed().await.unwrap();
        }
        let after_first = emails.snapshot();
        assert_eq!(after_first.status(), CacheStatus::Loading);
        assert_eq!(after_first.data(), None);
        assert!(after_first.is_fetching());
        assert_eq!(backend.calls(), 2);

        backend.gate.add_permits(1);
        assert_eq!(emails.settled().await.data(), Some(&2));
    }

    #[tokio::test]
    async fn test_invalidate_without_subscribers_is_noop() {
        let cache = FetchCache::new();
        assert_eq!(cache.invalidate(&QueryKey::Analytics), 0);
        assert!(!cache.refresh(&QueryKey::Analytics));
        assert!(cache.keys().is_empty());
    }

    #[tokio::test]
    async fn test_last_unsubscribe_drops_entry() {
        let cache = FetchCache::new();
        let backend = Backend::open();

        let mut first = cache.subscribe(QueryKey::Email(4), backend.fetcher(), None);
        first.settled().await;
        first.unsubscribe();
        assert!(cache.peek::<usize>(&QueryKey::Email(4)).is_none());

        let mut again = cache.subscribe(QueryKey::Email(4), backend.fetcher(), None);
        assert_eq!(again.settled().await.data(), Some(&2));
    }

    #[tokio::test]
    async fn test_resubscribe_mid_fetch_reuses_request() {
        let cache = FetchCache::new();
        let backend = Backend::gated(0);

        let first = cache.subscribe(QueryKey::Email(4), backend.fetcher(), None);
        drop(first);
        assert_eq!(cache.subscriber_count(&QueryKey::Email(4)), 0);
        assert!(!cache.refresh(&QueryKey::Email(4)));

        let mut again = cache.subscribe(QueryKey::Email(4), backend.fetcher(), None);
        assert_eq!(again.snapshot().status(), CacheStatus::Loading);
        assert_eq!(backend.calls(), 1);

        backend.gate.add_permits(1);
        assert_eq!(again.settled().await.data(), Some(&1));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_fetch_drops_entry_when_it_lands() {
        let cache = FetchCache::new();
        let backend = Backend::gated(0);

        drop(cache.subscribe(QueryKey::Analytics, backend.fetcher(), None));
        assert_eq!(cache.status(&QueryKey::Analytics), Some(CacheStatus::Loading));

        backend.gate.add_permits(1);
        while cache.status(&QueryKey::Analytics).is_some() {
            tokio::task::yield_now().await;
        }
        assert!(cache.keys().is_empty());

        let mut fresh = cache.subscribe(QueryKey::Analytics, backend.fetcher(), None);
        backend.gate.add_permits(1);
        assert_eq!(fresh.settled().await.data(), Some(&2));
    }

    #[tokio::test]
    async fn test_refresh_refetches_without_going_stale() {
        let cache = FetchCache::new();
        let backend = Backend::gated(1);
        let mut health = cache.subscribe(QueryKey::Health, backend.fetcher(), None);
        health.settled().await;

        assert!(cache.refresh(&QueryKey::Health));
        let during = health.snapshot();
        assert_eq!(during.status(), CacheStatus::Fresh);
        assert_eq!(during.data(), Some(&1));
        assert!(during.is_fetching());

        backend.gate.add_permits(1);
        assert_eq!(health.settled().await.data(), Some(&2));
    }

    #[tokio::test]
    async fn test_error_hides_data_and_invalidate_recovers() {
        let cache = FetchCache::new();
        let backend = Backend::failing_first(1);
        let mut analytics = cache.subscribe(QueryKey::Analytics, backend.fetcher(), None);

        let failed = analytics.settled().await;
        assert_eq!(failed.status(), CacheStatus::Error);
        assert_eq!(failed.error(), Some(&TransportError::status(500)));
        assert_eq!(failed.data(), None);

        cache.invalidate(&QueryKey::Analytics);
        let recovered = analytics.settled().await;
        assert_eq!(recovered.status(), CacheStatus::Fresh);
        assert_eq!(recovered.error(), None);
        assert_eq!(recovered.data(), Some(&2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_runs_while_subscribed() {
        let cache = FetchCache::new();
        let backend = Backend::failing_first(1);
        let mut emails =
            cache.subscribe(QueryKey::Emails, backend.fetcher(), Some(Duration::from_secs(30)));
        assert_eq!(emails.settled().await.status(), CacheStatus::Error);

        tokio::time::sleep(Duration::from_secs(31)).await;
        let polled = emails.settled().await;
        assert_eq!(polled.status(), CacheStatus::Fresh);
        assert_eq!(backend.calls(), 2);

        drop(emails);
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shortest_poll_interval_wins() {
        let cache = FetchCache::new();
        let backend = Backend::open();
        let mut slow =
            cache.subscribe(QueryKey::Analytics, backend.fetcher(), Some(Duration::from_secs(60)));
        let _fast =
            cache.subscribe(QueryKey::Analytics, backend.fetcher(), Some(Duration::from_secs(10)));
        let _ignored = cache.subscribe(QueryKey::Analytics, backend.fetcher(), Some(Duration::ZERO));
        slow.settled().await;

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_interval_relaxes_when_fast_subscriber_leaves() {
        let cache = FetchCache::new();
        let backend = Backend::open();
        let mut slow =
            cache.subscribe(QueryKey::Analytics, backend.fetcher(), Some(Duration::from_secs(60)));
        let fast =
            cache.subscribe(QueryKey::Analytics, backend.fetcher(), Some(Duration::from_secs(10)));
        slow.settled().await;
        assert_eq!(backend.calls(), 1);

        drop(fast);
        tokio::time::sleep(Duration::from_secs(55)).await;
        assert_eq!(backend.calls(), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_when_only_non_polling_subscribers_remain() {
        let cache = FetchCache::new();
        let backend = Backend::open();
        let mut plain = cache.subscribe(QueryKey::Emails, backend.fetcher(), None);
        let polling =
            cache.subscribe(QueryKey::Emails, backend.fetcher(), Some(Duration::from_secs(30)));
        plain.settled().await;

        drop(polling);
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(backend.calls(), 1);
        assert_eq!(cache.subscriber_count(&QueryKey::Emails), 1);
    }

    #[tokio::test]
    async fn test_age_counts_from_last_success() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::starting_at(start);
        let cache = FetchCache::with_clock(clock.clone());
        let backend = Backend::gated(0);

        let mut emails = cache.subscribe(QueryKey::Emails, backend.fetcher(), None);
        assert_eq!(emails.age(), None);

        backend.gate.add_permits(1);
        emails.settled().await;
        clock.advance(chrono::Duration::seconds(90));
        assert_eq!(emails.age(), Some(chrono::Duration::seconds(90)));
    }

    #[tokio::test]
    async fn test_updated_at_comes_from_clock() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::starting_at(start);
        let cache = FetchCache::with_clock(clock.clone());
        let backend = Backend::open();

        let mut emails = cache.subscribe(QueryKey::Emails, backend.fetcher(), None);
        assert_eq!(emails.settled().await.updated_at(), Some(start));

        clock.advance(chrono::Duration::minutes(5));
        cache.refresh(&QueryKey::Emails);
        assert_eq!(
            emails.settled().await.updated_at(),
            Some(start + chrono::Duration::minutes(5))
        );
    }

    #[tokio::test]
    async fn test_dropping_cache_ends_subscriptions() {
        let cache = FetchCache::new();
        let backend = Backend::open();
        let mut emails =
            cache.subscribe(QueryKey::Emails, backend.fetcher(), Some(Duration::from_secs(5)));
        emails.settled().await;

        drop(cache);
        assert!(emails.changed().await.is_none());
    }
}
