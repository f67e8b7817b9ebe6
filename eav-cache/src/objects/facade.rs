//! Domain-scoped entry point to the object cache.

use eav_core::{
    CacheConfig, CacheDomain, CacheableObject, Clock, ContentHash, EavResult, ObjectId,
    SystemClock, UserId,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::bounded::{BoundedObjectCache, LoadPlan, RejectReason, SetOutcome};
use super::entry::EntrySnapshot;
use super::quota::QuotaResolver;
use crate::registry::DomainRegistry;
use crate::stats::CacheStatistics;

/// Registry of object caches, one per domain.
pub type ObjectRegistry<T> = DomainRegistry<BoundedObjectCache<T>>;

/// Object cache bound to one domain.
///
/// A disabled facade behaves like an always-empty cache: lookups miss,
/// every candidate needs loading and `set` is a no-op. Callers never have
/// to branch on whether caching is on.
///
/// Capacity, TTL and the quota resolver come from the first facade that
/// touches the domain.
pub struct ObjectCache<T> {
    domain: CacheDomain,
    enabled: bool,
    store: Arc<BoundedObjectCache<T>>,
}

impl<T> Clone for ObjectCache<T> {
    fn clone(&self) -> Self {
        Self {
            domain: self.domain.clone(),
            enabled: self.enabled,
            store: Arc::clone(&self.store),
        }
    }
}

impl<T: CacheableObject> ObjectCache<T> {
    pub fn new(
        registry: &ObjectRegistry<T>,
        config: &CacheConfig,
        resolver: Arc<dyn QuotaResolver>,
    ) -> EavResult<Self> {
        Self::with_clock(registry, config, resolver, Arc::new(SystemClock))
    }

    pub fn with_clock(
        registry: &ObjectRegistry<T>,
        config: &CacheConfig,
        resolver: Arc<dyn QuotaResolver>,
        clock: Arc<dyn Clock>,
    ) -> EavResult<Self> {
        config.validate()?;
        let store = registry.get_or_create(&config.domain, || {
            BoundedObjectCache::with_clock(config.max_entries, config.ttl, resolver, clock)
        });
        Ok(Self {
            domain: config.domain.clone(),
            enabled: config.enabled,
            store,
        })
    }

    pub fn domain(&self) -> &CacheDomain {
        &self.domain
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn get(&self, id: ObjectId, expected: &ContentHash) -> Option<Arc<T>> {
        if !self.enabled {
            return None;
        }
        self.store.get(id, expected)
    }

    pub fn get_without_hash_validation(&self, id: ObjectId) -> Option<Arc<T>> {
        if !self.enabled {
            return None;
        }
        self.store.get_without_hash_validation(id)
    }

    pub fn filter_need_to_load(&self, candidates: &[(ObjectId, ContentHash)]) -> LoadPlan<T> {
        if !self.enabled {
            return LoadPlan {
                hits: HashMap::new(),
                to_load: candidates.iter().map(|(id, _)| *id).collect(),
            };
        }
        self.store.filter_need_to_load(candidates)
    }

    pub fn set(&self, object: T) -> SetOutcome {
        if !self.enabled {
            return SetOutcome::Rejected(RejectReason::Disabled);
        }
        self.store.set(object)
    }

    pub fn set_shared(&self, object: Arc<T>) -> SetOutcome {
        if !self.enabled {
            return SetOutcome::Rejected(RejectReason::Disabled);
        }
        self.store.set_shared(object)
    }

    /// Remove `id` from the domain's cache. Works while disabled.
    pub fn remove(&self, id: ObjectId) -> bool {
        self.store.remove(id)
    }

    /// Empty the domain's cache. Works while disabled.
    pub fn clear(&self) {
        self.store.clear();
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.store.contains(id)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn owners_of(&self, id: ObjectId) -> Option<HashSet<UserId>> {
        self.store.owners_of(id)
    }

    pub fn owned_count(&self, user: UserId) -> usize {
        self.store.owned_count(user)
    }

    /// Bookkeeping of the entry for `id`. Works while disabled.
    pub fn entry_snapshot(&self, id: ObjectId) -> Option<EntrySnapshot> {
        self.store.entry_snapshot(id)
    }

    pub fn statistics(&self) -> CacheStatistics {
        self.store.statistics()
    }
}
