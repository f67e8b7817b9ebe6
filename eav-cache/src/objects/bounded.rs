//! Capacity- and quota-bounded object cache for a single domain.
//!
//! # Locking
//!
//! All entries and the ownership index sit behind one `parking_lot::RwLock`.
//! Lookups check visibility under a shared read lock, so concurrent
//! lookups never wait on each other and misses never lock exclusively. A
//! hit then takes the write lock, checks visibility again, and records
//! access time and ownership. `set`, `remove` and `clear` take the write
//! lock directly.
//!
//! The quota resolver is never called with the lock held. `set` resolves
//! the acting user's quota and a snapshot of every tracked user's quota
//! first, then locks and decides admission from those values alone.

use eav_core::{CacheableObject, Clock, ContentHash, ObjectId, SchemeId, SystemClock, UserId};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use super::entry::{EntrySnapshot, ObjectCacheEntry};
use super::eviction::{Eviction, EvictionPolicy};
use super::quota::{resolve_quota, QuotaPlan, QuotaResolver, QuotaSnapshot};
use super::state::CacheState;
use crate::stats::{CacheStatistics, StatisticsAccumulator};

/// Result of a bulk lookup: what the cache could serve and what it could not.
#[derive(Debug)]
pub struct LoadPlan<T> {
    pub hits: HashMap<ObjectId, Arc<T>>,
    pub to_load: HashSet<ObjectId>,
}

impl<T> LoadPlan<T> {
    pub fn is_complete(&self) -> bool {
        self.to_load.is_empty()
    }
}

/// Why an object was not cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The object has no content hash.
    MissingHash,
    /// The acting user is at quota and owns nothing evictable.
    UserQuotaExhausted,
    /// The cache is full and nothing could be evicted.
    CapacityExhausted,
    /// Caching is switched off.
    Disabled,
}

/// Outcome of [`BoundedObjectCache::set`]. Callers are free to ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Inserted,
    Updated,
    Rejected(RejectReason),
}

impl SetOutcome {
    pub fn is_cached(&self) -> bool {
        !matches!(self, SetOutcome::Rejected(_))
    }
}

/// Object cache bounded by entry count and per-user quotas.
pub struct BoundedObjectCache<T> {
    state: RwLock<CacheState<T>>,
    max_entries: usize,
    ttl: Duration,
    resolver: Arc<dyn QuotaResolver>,
    clock: Arc<dyn Clock>,
    stats: StatisticsAccumulator,
}

impl<T: CacheableObject> BoundedObjectCache<T> {
    pub fn new(max_entries: usize, ttl: Duration, resolver: Arc<dyn QuotaResolver>) -> Self {
        Self::with_clock(max_entries, ttl, resolver, Arc::new(SystemClock))
    }

    pub fn with_clock(
        max_entries: usize,
        ttl: Duration,
        resolver: Arc<dyn QuotaResolver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            max_entries,
            ttl,
            resolver,
            clock,
            stats: StatisticsAccumulator::new(),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Cached object if present, unexpired, and hashed as `expected`.
    ///
    /// A hash mismatch is a miss but leaves the entry in place.
    pub fn get(&self, id: ObjectId, expected: &ContentHash) -> Option<Arc<T>> {
        self.lookup(id, Some(expected))
    }

    /// Cached object if present and unexpired, whatever its hash.
    pub fn get_without_hash_validation(&self, id: ObjectId) -> Option<Arc<T>> {
        self.lookup(id, None)
    }

    fn lookup(&self, id: ObjectId, expected: Option<&ContentHash>) -> Option<Arc<T>> {
        let user = self.resolver.current_user_id();
        let now = self.clock.now();

        let visible = self
            .state
            .read()
            .entries
            .get(&id)
            .is_some_and(|entry| entry.is_visible(now, self.ttl, expected));
        if !visible {
            self.stats.record_miss();
            return None;
        }

        // The entry may have been removed or refreshed since the read lock
        // was released, so check again before recording the access.
        let payload = {
            let mut state = self.state.write();
            let payload = state
                .entries
                .get_mut(&id)
                .filter(|entry| entry.is_visible(now, self.ttl, expected))
                .map(|entry| {
                    entry.touch(user, now);
                    Arc::clone(&entry.payload)
                });
            if payload.is_some() {
                state.record_owner(user, id);
            }
            payload
        };

        match payload {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        payload
    }

    /// Split `candidates` into cache hits and ids that must be loaded.
    ///
    /// Every candidate id ends up in exactly one of the two halves.
    pub fn filter_need_to_load(&self, candidates: &[(ObjectId, ContentHash)]) -> LoadPlan<T> {
        let user = self.resolver.current_user_id();
        let now = self.clock.now();

        let mut maybe_hits = Vec::new();
        let mut to_load = HashSet::new();
        {
            let state = self.state.read();
            for (id, hash) in candidates {
                let visible = state
                    .entries
                    .get(id)
                    .is_some_and(|entry| entry.is_visible(now, self.ttl, Some(hash)));
                if visible {
                    maybe_hits.push((*id, *hash));
                } else {
                    to_load.insert(*id);
                }
            }
        }

        let mut hits = HashMap::with_capacity(maybe_hits.len());
        let mut hit_count = 0u64;
        if !maybe_hits.is_empty() {
            let mut state = self.state.write();
            for (id, hash) in &maybe_hits {
                let payload = state
                    .entries
                    .get_mut(id)
                    .filter(|entry| entry.is_visible(now, self.ttl, Some(hash)))
                    .map(|entry| {
                        entry.touch(user, now);
                        Arc::clone(&entry.payload)
                    });
                match payload {
                    Some(payload) => {
                        state.record_owner(user, *id);
                        hits.insert(*id, payload);
                        hit_count += 1;
                    }
                    None => {
                        to_load.insert(*id);
                    }
                }
            }
        }

        // A candidate listed twice with different hashes can land in both
        // halves; the hit wins.
        to_load.retain(|id| !hits.contains_key(id));

        self.stats
            .record_lookups(hit_count, candidates.len() as u64 - hit_count);

        LoadPlan { hits, to_load }
    }

    // ------------------------------------------------------------------
    // Admission
    // ------------------------------------------------------------------

    pub fn set(&self, object: T) -> SetOutcome {
        self.set_shared(Arc::new(object))
    }

    /// Cache an object already behind an `Arc`.
    ///
    /// Never fails the caller: when the object cannot be cached the outcome
    /// says why and the cache is left unchanged.
    pub fn set_shared(&self, object: Arc<T>) -> SetOutcome {
        let id = object.object_id();
        let Some(hash) = object.content_hash() else {
            tracing::warn!(object_id = id, "Object has no content hash, not caching");
            return self.reject(id, RejectReason::MissingHash);
        };

        let plan = self.plan_quotas(object.scheme_id());
        let now = self.clock.now();
        let user = plan.acting_user;

        let mut state = self.state.write();

        if let Some(entry) = state.entries.get_mut(&id) {
            entry.refresh(object, hash, user, now);
            state.record_owner(user, id);
            drop(state);
            self.stats.record_set();
            return SetOutcome::Updated;
        }

        if let Some(quota) = plan.acting_quota {
            if state.owned_count(user) >= quota {
                match state.evict_for_user(user) {
                    Some(victim) => self.note_eviction(Eviction {
                        object_id: victim,
                        user_id: Some(user),
                        policy: EvictionPolicy::UserQuota,
                    }),
                    None => {
                        drop(state);
                        return self.reject(id, RejectReason::UserQuotaExhausted);
                    }
                }
            }
        }

        if state.entries.len() >= self.max_entries {
            match state.evict_global(&plan.snapshot) {
                Some(eviction) => self.note_eviction(eviction),
                None => {
                    drop(state);
                    return self.reject(id, RejectReason::CapacityExhausted);
                }
            }
        }

        let scheme_id = object.scheme_id();
        state.insert(ObjectCacheEntry::new(id, scheme_id, hash, object, user, now));
        drop(state);

        self.stats.record_set();
        SetOutcome::Inserted
    }

    /// Resolve every quota `set` might need. Runs without the lock held.
    fn plan_quotas(&self, scheme_id: SchemeId) -> QuotaPlan {
        let acting_user = self.resolver.current_user_id();
        if !self.resolver.quotas_enabled() || self.resolver.excluded_scheme() == Some(scheme_id) {
            return QuotaPlan::unbounded(acting_user);
        }

        let acting_quota = resolve_quota(&*self.resolver, acting_user);

        // Read lock only long enough to copy the user list
        let tracked = self.state.read().tracked_users();

        let mut snapshot = QuotaSnapshot::default();
        snapshot.insert(acting_user, acting_quota);
        for user in tracked {
            if user != acting_user {
                snapshot.insert(user, resolve_quota(&*self.resolver, user));
            }
        }

        QuotaPlan {
            acting_user,
            acting_quota,
            snapshot,
        }
    }

    fn note_eviction(&self, eviction: Eviction) {
        tracing::debug!(
            object_id = eviction.object_id,
            user_id = ?eviction.user_id,
            policy = ?eviction.policy,
            "Evicted cached object"
        );
        self.stats.record_eviction();
    }

    fn reject(&self, id: ObjectId, reason: RejectReason) -> SetOutcome {
        tracing::debug!(object_id = id, reason = ?reason, "Object not admitted to cache");
        self.stats.record_rejection();
        SetOutcome::Rejected(reason)
    }

    // ------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------

    pub fn remove(&self, id: ObjectId) -> bool {
        self.state.write().remove(id).is_some()
    }

    /// Drop all entries and ownership, and reset hit/miss counters.
    pub fn clear(&self) {
        self.state.write().clear();
        self.stats.reset();
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// True if an entry exists for `id`, expired or not.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.state.read().entries.contains_key(&id)
    }

    /// Number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn owners_of(&self, id: ObjectId) -> Option<HashSet<UserId>> {
        self.state
            .read()
            .entries
            .get(&id)
            .map(|entry| entry.owners.clone())
    }

    pub fn owned_count(&self, user: UserId) -> usize {
        self.state.read().owned_count(user)
    }

    /// Bookkeeping of the entry for `id`, expired or not. Does not count
    /// as an access.
    pub fn entry_snapshot(&self, id: ObjectId) -> Option<EntrySnapshot> {
        self.state.read().entries.get(&id).map(ObjectCacheEntry::snapshot)
    }

    pub fn statistics(&self) -> CacheStatistics {
        let (entry_count, tracked_users) = {
            let state = self.state.read();
            (state.entries.len() as u64, state.ownership.len() as u64)
        };
        CacheStatistics {
            hits: self.stats.hits(),
            misses: self.stats.misses(),
            sets: self.stats.sets(),
            evictions: self.stats.evictions(),
            rejections: self.stats.rejections(),
            entry_count,
            tracked_users,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        self.state.read().is_consistent()
    }
}
