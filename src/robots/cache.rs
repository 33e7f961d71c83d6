//! Bounded robots.txt ruleset cache
//!
//! The cache maps a [`HostKey`] to the parsed ruleset of that host together
//! with the admission gates of every user agent that has been throttled
//! there. It holds at most `capacity` hosts; when full, a pass evicts the
//! least active hosts that have no crawl-delay traffic in flight and resets the
//! activity of the survivors.
//!
//! Failed robots.txt fetches are cached as `None` so a broken host is not
//! asked again until its entry is evicted or the cache is released.
//!
//! Concurrent misses for the same key are not de-duplicated: each caller
//! fetches on its own and the first stored result wins.

use crate::config::CacheConfig;
use crate::robots::gate::{Admission, Gate};
use crate::robots::{ParsedRobots, RulesetFetcher};
use crate::url::{HostKey, HostTarget};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Default maximum number of cached hosts
pub const DEFAULT_CAPACITY: usize = 1000;

/// Default share of the capacity removed by one eviction pass
pub const DEFAULT_EVICTION_FRACTION: f64 = 0.1;

/// Activity bookkeeping of one host, guarded by the entry's own lock
#[derive(Debug, Default)]
struct HostActivity {
    /// Number of `enter` calls since the last eviction pass
    counter: u64,
    /// Admission gates keyed by user agent, created on first use
    gates: HashMap<String, Arc<Gate>>,
}

/// One cached host
#[derive(Debug)]
struct HostEntry<R> {
    ruleset: Option<Arc<R>>,
    activity: Mutex<HostActivity>,
}

impl<R> HostEntry<R> {
    fn new(ruleset: Option<Arc<R>>) -> Self {
        Self {
            ruleset,
            activity: Mutex::new(HostActivity::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HostActivity> {
        self.activity.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Counts one entry and returns the gate for `user_agent`
    ///
    /// The gate keeps the spacing it was created with.
    fn gate_for(&self, user_agent: &str, spacing: Duration) -> Arc<Gate> {
        let mut activity = self.lock();
        activity.counter += 1;
        Arc::clone(
            activity
                .gates
                .entry(user_agent.to_string())
                .or_insert_with(|| Gate::new(spacing)),
        )
    }

    /// An entry with a locked or occupied gate must not be evicted
    fn is_pinned(&self) -> bool {
        self.lock().gates.values().any(|gate| gate.is_busy())
    }

    fn counter(&self) -> u64 {
        self.lock().counter
    }

    fn reset_counter(&self) {
        self.lock().counter = 0;
    }
}

/// Mutable cache state, guarded by the cache-wide lock
#[derive(Debug)]
struct CacheState<R> {
    entries: HashMap<HostKey, Arc<HostEntry<R>>>,
    capacity: usize,
    eviction_fraction: f64,
}

impl<R> CacheState<R> {
    /// Runs an eviction pass if `incoming` new entries would not fit
    ///
    /// Removes the `round(capacity * eviction_fraction)` least active unpinned
    /// entries, or more if that is what it takes to make room, then resets the
    /// activity counter of every remaining entry.
    fn make_room(&mut self, incoming: usize) {
        if self.entries.len() + incoming <= self.capacity {
            return;
        }

        let quota = (self.capacity as f64 * self.eviction_fraction).round() as usize;
        let needed = (self.entries.len() + incoming).saturating_sub(self.capacity);
        let target = quota.max(needed);

        let mut candidates: Vec<(u64, &HostKey)> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_pinned())
            .map(|(key, entry)| (entry.counter(), key))
            .collect();
        // Ties on activity are broken by key so a pass is deterministic
        candidates.sort();

        let doomed: Vec<HostKey> = candidates
            .into_iter()
            .take(target)
            .map(|(_, key)| key.clone())
            .collect();

        for key in &doomed {
            self.entries.remove(key);
        }
        for entry in self.entries.values() {
            entry.reset_counter();
        }

        tracing::info!(
            evicted = doomed.len(),
            remaining = self.entries.len(),
            capacity = self.capacity,
            "Robots cache eviction pass"
        );
        if self.entries.len() + incoming > self.capacity {
            tracing::warn!(
                "Robots cache over capacity: {} entries pinned by crawl-delay traffic",
                self.entries.len()
            );
        }
    }
}

/// Capacity-limited cache of robots.txt rulesets keyed by physical host
///
/// The cache is meant to be constructed once and shared (`Arc<RobotsCache>`)
/// between every client that should observe the same crawl budget.
#[derive(Debug)]
pub struct RobotsCache<R = ParsedRobots> {
    state: Mutex<CacheState<R>>,
}

impl<R> RobotsCache<R> {
    /// Creates a cache with the default capacity and eviction fraction
    pub fn new() -> Self {
        Self::with_config(&CacheConfig::default())
    }

    /// Creates a cache from its configuration section
    pub fn with_config(config: &CacheConfig) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                capacity: config.capacity.max(1),
                eviction_fraction: config.eviction_fraction,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Maximum number of hosts kept
    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Changes the maximum number of hosts, evicting right away if needed
    ///
    /// A capacity of zero is treated as one.
    pub fn set_capacity(&self, capacity: usize) {
        let mut state = self.lock();
        state.capacity = capacity.max(1);
        state.make_room(0);
    }

    /// Number of cached hosts
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns true if no host is cached
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Returns true if `key` has a cached (possibly negative) result
    pub fn contains(&self, key: &HostKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Returns the cached ruleset for `key`
    ///
    /// The outer `Option` tells whether the host is cached at all, the inner
    /// one whether its robots.txt could be fetched.
    pub fn get(&self, key: &HostKey) -> Option<Option<Arc<R>>> {
        self.lock()
            .entries
            .get(key)
            .map(|entry| entry.ruleset.clone())
    }

    /// Stores a fetch result for `key` and returns the resident ruleset
    ///
    /// If another task stored a result for the same key in the meantime, that
    /// entry (and its gates) is kept.
    fn put(&self, key: HostKey, ruleset: Option<Arc<R>>) -> Option<Arc<R>> {
        let mut state = self.lock();
        if let Some(existing) = state.entries.get(&key) {
            return existing.ruleset.clone();
        }
        state.make_room(1);
        state
            .entries
            .insert(key, Arc::new(HostEntry::new(ruleset.clone())));
        ruleset
    }

    /// Returns the ruleset of `target`, fetching it on a miss
    ///
    /// Resolves the host key first; see [`fetch_key`](Self::fetch_key).
    pub async fn fetch<F>(&self, target: &HostTarget, fetcher: &F) -> Option<Arc<R>>
    where
        F: RulesetFetcher<R> + ?Sized,
    {
        let key = HostKey::resolve(target).await;
        self.fetch_key(&key, target, fetcher).await
    }

    /// Returns the ruleset cached under `key`, fetching it from `target` on a
    /// miss
    ///
    /// A failed fetch is stored as `None` and returned as such.
    pub async fn fetch_key<F>(
        &self,
        key: &HostKey,
        target: &HostTarget,
        fetcher: &F,
    ) -> Option<Arc<R>>
    where
        F: RulesetFetcher<R> + ?Sized,
    {
        if let Some(ruleset) = self.get(key) {
            tracing::debug!("Robots cache hit for {}", key);
            return ruleset;
        }

        tracing::debug!("Robots cache miss for {}, fetching robots.txt", key);
        let ruleset = fetcher.fetch_ruleset(target).await.map(Arc::new);
        if ruleset.is_none() {
            tracing::debug!("No robots.txt for {}, allowing all requests", key);
        }
        self.put(key.clone(), ruleset)
    }

    /// Waits for the crawl-delay gate of (`key`, `user_agent`)
    ///
    /// Does nothing and returns `None` when `crawl_delay` is absent or `key` is
    /// not cached. Otherwise counts the entry as active and suspends until the
    /// gate admits the caller.
    pub async fn enter(
        &self,
        user_agent: &str,
        crawl_delay: Option<Duration>,
        key: &HostKey,
    ) -> Option<Admission> {
        self.enter_until(user_agent, crawl_delay, key, std::future::pending())
            .await
    }

    /// Like [`enter`](Self::enter), but gives up waiting when `cancel`
    /// completes
    ///
    /// A cancelled wait is reported as [`Admission::Interrupted`] and still
    /// counts as an admission.
    pub async fn enter_until<C>(
        &self,
        user_agent: &str,
        crawl_delay: Option<Duration>,
        key: &HostKey,
        cancel: C,
    ) -> Option<Admission>
    where
        C: Future<Output = ()>,
    {
        let spacing = crawl_delay?;

        // Reserve the slot under the cache lock so an eviction pass sees it
        let ticket = {
            let state = self.lock();
            let entry = state.entries.get(key)?;
            entry.gate_for(user_agent, spacing).join()
        };

        let admission = ticket.wait(cancel).await;
        if admission.waited() {
            tracing::debug!(
                "Admitted {} at {} after crawl-delay wait ({:?})",
                user_agent,
                key,
                admission
            );
        }
        Some(admission)
    }

    /// Drops every cached host
    ///
    /// Tasks already waiting at a gate are not woken; they finish on their own
    /// release timer or safety deadline.
    pub fn release(&self) {
        let mut state = self.lock();
        let released = state.entries.len();
        state.entries.clear();
        tracing::info!("Released robots cache ({} hosts)", released);
    }
}

impl<R> Default for RobotsCache<R> {
    fn default() -> Self {
        Self::new()
    }
}
