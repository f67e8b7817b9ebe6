//! Per-domain metadata tables.

use eav_core::{elapsed_between, Clock, Scheme, SchemeId, Timestamp, TypeId, TypeInfo};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::external_types::ExternalTypeRegistry;
use crate::stats::{MetadataStatistics, StatisticsAccumulator};

#[derive(Debug)]
struct Cached<V> {
    value: Arc<V>,
    cached_at: Timestamp,
}

impl<V> Clone for Cached<V> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            cached_at: self.cached_at,
        }
    }
}

impl<V> Cached<V> {
    fn fresh(&self, now: Timestamp, ttl: Duration) -> Option<Arc<V>> {
        (elapsed_between(self.cached_at, now) < ttl).then(|| Arc::clone(&self.value))
    }
}

/// Scheme tables. Both maps always hold the same set of schemes.
#[derive(Debug, Default)]
struct SchemeTables {
    by_name: HashMap<String, Cached<Scheme>>,
    by_id: HashMap<SchemeId, Cached<Scheme>>,
}

impl SchemeTables {
    fn insert(&mut self, entry: Cached<Scheme>) {
        let id = entry.value.id;
        let name = entry.value.name.clone();

        // A renamed scheme must not stay reachable under its old name, and a
        // name reused by another id must not keep the old id alive.
        if let Some(previous) = self.by_id.remove(&id) {
            self.by_name.remove(&previous.value.name);
        }
        if let Some(previous) = self.by_name.remove(&name) {
            self.by_id.remove(&previous.value.id);
        }

        self.by_name.insert(name, entry.clone());
        self.by_id.insert(id, entry);
    }

    fn remove_by_id(&mut self, id: SchemeId) -> Option<Arc<Scheme>> {
        let entry = self.by_id.remove(&id)?;
        self.by_name.remove(&entry.value.name);
        Some(entry.value)
    }

    fn remove_by_name(&mut self, name: &str) -> Option<Arc<Scheme>> {
        let entry = self.by_name.remove(name)?;
        self.by_id.remove(&entry.value.id);
        Some(entry.value)
    }
}

#[derive(Debug, Default)]
struct TypeTables {
    id_by_name: HashMap<String, TypeId>,
    by_id: HashMap<TypeId, Cached<TypeInfo>>,
}

impl TypeTables {
    fn insert(&mut self, entry: Cached<TypeInfo>) {
        if let Some(previous) = self.by_id.remove(&entry.value.id) {
            self.id_by_name.remove(&previous.value.name);
        }
        if let Some(previous_id) = self.id_by_name.remove(&entry.value.name) {
            self.by_id.remove(&previous_id);
        }
        self.id_by_name
            .insert(entry.value.name.clone(), entry.value.id);
        self.by_id.insert(entry.value.id, entry);
    }

    fn remove(&mut self, id: TypeId) -> Option<Arc<TypeInfo>> {
        let entry = self.by_id.remove(&id)?;
        self.id_by_name.remove(&entry.value.name);
        Some(entry.value)
    }
}

/// Metadata held for one domain.
///
/// Every lookup counts as a hit or a miss. While disabled, all lookups and
/// inserts are no-ops reporting a miss; the external type registry keeps
/// working regardless.
pub struct DomainMetadataStore {
    enabled: AtomicBool,
    ttl: RwLock<Duration>,
    schemes: RwLock<SchemeTables>,
    types: RwLock<TypeTables>,
    external_types: ExternalTypeRegistry,
    stats: StatisticsAccumulator,
    clock: Arc<dyn Clock>,
}

impl DomainMetadataStore {
    pub fn new(enabled: bool, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            ttl: RwLock::new(ttl),
            schemes: RwLock::new(SchemeTables::default()),
            types: RwLock::new(TypeTables::default()),
            external_types: ExternalTypeRegistry::new(),
            stats: StatisticsAccumulator::new(),
            clock,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Toggle the cache. Disabling empties the scheme and type tables but
    /// leaves the external type registry alone.
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::AcqRel);
        if was && !enabled {
            self.clear_tables();
        }
    }

    pub fn ttl(&self) -> Duration {
        *self.ttl.read()
    }

    pub fn set_ttl(&self, ttl: Duration) {
        *self.ttl.write() = ttl;
    }

    pub fn external_types(&self) -> &ExternalTypeRegistry {
        &self.external_types
    }

    // ------------------------------------------------------------------
    // Schemes
    // ------------------------------------------------------------------

    pub fn scheme_by_name(&self, name: &str) -> Option<Arc<Scheme>> {
        if !self.is_enabled() {
            return None;
        }
        let (now, ttl) = (self.clock.now(), self.ttl());
        let found = self
            .schemes
            .read()
            .by_name
            .get(name)
            .and_then(|entry| entry.fresh(now, ttl));
        self.count(found)
    }

    pub fn scheme_by_id(&self, id: SchemeId) -> Option<Arc<Scheme>> {
        if !self.is_enabled() {
            return None;
        }
        let (now, ttl) = (self.clock.now(), self.ttl());
        let found = self
            .schemes
            .read()
            .by_id
            .get(&id)
            .and_then(|entry| entry.fresh(now, ttl));
        self.count(found)
    }

    /// Cache a scheme under both its name and id.
    pub fn cache_scheme(&self, scheme: Scheme) -> Option<Arc<Scheme>> {
        if !self.is_enabled() {
            return None;
        }
        let entry = Cached {
            value: Arc::new(scheme),
            cached_at: self.clock.now(),
        };
        let value = Arc::clone(&entry.value);
        self.schemes.write().insert(entry);
        self.stats.record_set();
        Some(value)
    }

    /// Drop a scheme from both tables and from the external type registry.
    pub fn invalidate_scheme_by_id(&self, id: SchemeId) -> bool {
        let removed = self.schemes.write().remove_by_id(id).is_some();
        let unbound = self.external_types.remove_scheme(id).is_some();
        removed || unbound
    }

    /// Drop a scheme from both tables and from the external type registry.
    pub fn invalidate_scheme_by_name(&self, name: &str) -> bool {
        let removed = self.schemes.write().remove_by_name(name);
        let scheme_id = removed
            .as_ref()
            .map(|scheme| scheme.id)
            .or_else(|| {
                self.external_types
                    .resolve_type_by_scheme_name(name)
                    .map(|binding| binding.scheme_id)
            });
        let unbound = scheme_id
            .and_then(|id| self.external_types.remove_scheme(id))
            .is_some();
        removed.is_some() || unbound
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    pub fn type_id(&self, name: &str) -> Option<TypeId> {
        if !self.is_enabled() {
            return None;
        }
        let (now, ttl) = (self.clock.now(), self.ttl());
        let found = {
            let types = self.types.read();
            types.id_by_name.get(name).and_then(|id| {
                types
                    .by_id
                    .get(id)
                    .and_then(|entry| entry.fresh(now, ttl))
                    .map(|info| info.id)
            })
        };
        self.count(found)
    }

    pub fn type_by_id(&self, id: TypeId) -> Option<Arc<TypeInfo>> {
        if !self.is_enabled() {
            return None;
        }
        let (now, ttl) = (self.clock.now(), self.ttl());
        let found = self
            .types
            .read()
            .by_id
            .get(&id)
            .and_then(|entry| entry.fresh(now, ttl));
        self.count(found)
    }

    pub fn cache_type(&self, info: TypeInfo) {
        self.cache_types_by_id(std::iter::once(info));
    }

    /// Cache a batch of types under one lock acquisition.
    pub fn cache_types_by_id<I>(&self, types: I)
    where
        I: IntoIterator<Item = TypeInfo>,
    {
        if !self.is_enabled() {
            return;
        }
        let now = self.clock.now();
        let mut tables = self.types.write();
        for info in types {
            tables.insert(Cached {
                value: Arc::new(info),
                cached_at: now,
            });
            self.stats.record_set();
        }
    }

    pub fn invalidate_type(&self, id: TypeId) -> bool {
        self.types.write().remove(id).is_some()
    }

    // ------------------------------------------------------------------
    // Reset
    // ------------------------------------------------------------------

    /// Empty scheme/type tables and reset counters. The registry survives.
    pub fn clear(&self) {
        self.clear_tables();
        self.stats.reset();
    }

    /// [`DomainMetadataStore::clear`] plus a wipe of the external type registry.
    pub fn clear_all(&self) {
        self.clear();
        self.external_types.reset();
    }

    pub fn statistics(&self) -> MetadataStatistics {
        MetadataStatistics {
            enabled: self.is_enabled(),
            hits: self.stats.hits(),
            misses: self.stats.misses(),
            scheme_count: self.schemes.read().by_id.len() as u64,
            type_count: self.types.read().by_id.len() as u64,
            external_type_count: self.external_types.len() as u64,
        }
    }

    fn clear_tables(&self) {
        *self.schemes.write() = SchemeTables::default();
        *self.types.write() = TypeTables::default();
    }

    fn count<V>(&self, found: Option<V>) -> Option<V> {
        if found.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        found
    }
}
