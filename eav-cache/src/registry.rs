//! Shared per-domain store registry.
//!
//! One store exists per [`CacheDomain`] for the lifetime of the registry.
//! Facades are cheap and numerous; they resolve their store here instead of
//! reaching for process-wide statics. Hand the same `Arc<DomainRegistry<_>>`
//! to every facade that should share state.

use dashmap::DashMap;
use eav_core::CacheDomain;
use std::sync::Arc;

/// Registry of lazily created, per-domain stores.
pub struct DomainRegistry<S> {
    stores: DashMap<CacheDomain, Arc<S>>,
}

impl<S> Default for DomainRegistry<S> {
    fn default() -> Self {
        Self {
            stores: DashMap::new(),
        }
    }
}

impl<S> DomainRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the store for `domain`, creating it with `create` on first access.
    ///
    /// `create` runs at most once per domain, while the shard holding the
    /// domain is locked; it must not call back into this registry.
    pub fn get_or_create<F>(&self, domain: &CacheDomain, create: F) -> Arc<S>
    where
        F: FnOnce() -> S,
    {
        if let Some(store) = self.stores.get(domain) {
            return Arc::clone(store.value());
        }

        let store = self.stores.entry(domain.clone()).or_insert_with(|| {
            tracing::debug!(domain = %domain, "Creating cache store for domain");
            Arc::new(create())
        });
        Arc::clone(store.value())
    }

    /// Return the store for `domain` if one was created.
    pub fn get(&self, domain: &CacheDomain) -> Option<Arc<S>> {
        self.stores.get(domain).map(|store| Arc::clone(store.value()))
    }

    /// Domains that currently have a store.
    pub fn domains(&self) -> Vec<CacheDomain> {
        self.stores.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}
