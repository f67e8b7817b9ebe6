//! Domain-scoped entry point to the metadata cache.

use eav_core::{
    CacheConfig, CacheDomain, Clock, EavResult, MetadataError, Scheme, SchemeId, SystemClock,
    TypeId, TypeInfo,
};
use std::sync::Arc;
use std::time::Duration;

use super::external_types::{
    ExternalTypeBinding, MetadataProvider, ScanReport, TypeCatalog,
};
use super::store::DomainMetadataStore;
use crate::registry::DomainRegistry;
use crate::stats::MetadataStatistics;

/// Registry of metadata stores, one per domain.
pub type MetadataRegistry = DomainRegistry<DomainMetadataStore>;

/// Metadata cache bound to one domain.
///
/// Any number of facades may exist for the same domain; they all share the
/// store held by the registry. The store's enablement and TTL are taken from
/// the configuration of whichever facade touches the domain first, and can
/// be changed afterwards through [`MetadataCache::set_enabled`] and
/// [`MetadataCache::set_ttl`].
#[derive(Clone)]
pub struct MetadataCache {
    domain: CacheDomain,
    store: Arc<DomainMetadataStore>,
}

impl MetadataCache {
    /// Resolve (or create) the store for `config.domain`.
    pub fn new(registry: &MetadataRegistry, config: &CacheConfig) -> EavResult<Self> {
        Self::with_clock(registry, config, Arc::new(SystemClock))
    }

    /// Like [`MetadataCache::new`] with an explicit time source.
    pub fn with_clock(
        registry: &MetadataRegistry,
        config: &CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> EavResult<Self> {
        config.validate()?;
        let store = registry.get_or_create(&config.domain, || {
            DomainMetadataStore::new(config.enabled, config.ttl, clock)
        });
        Ok(Self {
            domain: config.domain.clone(),
            store,
        })
    }

    pub fn domain(&self) -> &CacheDomain {
        &self.domain
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_enabled()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.store.set_enabled(enabled);
    }

    pub fn set_ttl(&self, ttl: Duration) {
        self.store.set_ttl(ttl);
    }

    pub fn scheme_by_name(&self, name: &str) -> Option<Arc<Scheme>> {
        self.store.scheme_by_name(name)
    }

    pub fn scheme_by_id(&self, id: SchemeId) -> Option<Arc<Scheme>> {
        self.store.scheme_by_id(id)
    }

    pub fn cache_scheme(&self, scheme: Scheme) -> Option<Arc<Scheme>> {
        self.store.cache_scheme(scheme)
    }

    pub fn invalidate_scheme_by_name(&self, name: &str) -> bool {
        self.store.invalidate_scheme_by_name(name)
    }

    pub fn invalidate_scheme_by_id(&self, id: SchemeId) -> bool {
        self.store.invalidate_scheme_by_id(id)
    }

    /// Cached scheme, or fetch it through `provider` and cache the result.
    ///
    /// Provider errors are returned to the caller; they concern the metadata
    /// query, not the cache.
    pub async fn scheme_or_fetch<P>(&self, name: &str, provider: &P) -> EavResult<Arc<Scheme>>
    where
        P: MetadataProvider + ?Sized,
    {
        if let Some(scheme) = self.scheme_by_name(name) {
            return Ok(scheme);
        }
        let scheme = provider
            .scheme_by_name(name)
            .await?
            .ok_or_else(|| MetadataError::SchemeNotFound {
                name: name.to_string(),
            })?;
        // A disabled cache stores nothing, so hand back the fetched value
        Ok(self
            .cache_scheme(scheme.clone())
            .unwrap_or_else(|| Arc::new(scheme)))
    }

    pub fn type_id(&self, name: &str) -> Option<TypeId> {
        self.store.type_id(name)
    }

    pub fn type_by_id(&self, id: TypeId) -> Option<Arc<TypeInfo>> {
        self.store.type_by_id(id)
    }

    pub fn cache_type(&self, info: TypeInfo) {
        self.store.cache_type(info);
    }

    pub fn cache_types_by_id<I>(&self, types: I)
    where
        I: IntoIterator<Item = TypeInfo>,
    {
        self.store.cache_types_by_id(types);
    }

    pub fn invalidate_type(&self, id: TypeId) -> bool {
        self.store.invalidate_type(id)
    }

    /// Drop every cached scheme and type. Same as [`MetadataCache::clear`].
    pub fn invalidate_all(&self) {
        self.store.clear();
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    pub fn clear_all(&self) {
        self.store.clear_all();
    }

    /// Populate the external type registry. See [`super::ExternalTypeRegistry::initialize`].
    pub async fn initialize_external_type_registry<C, P>(
        &self,
        catalog: &C,
        provider: &P,
    ) -> ScanReport
    where
        C: TypeCatalog + ?Sized,
        P: MetadataProvider + ?Sized,
    {
        self.store
            .external_types()
            .initialize(catalog, provider)
            .await
    }

    pub fn register_external_type(
        &self,
        type_name: impl Into<String>,
        scheme: &Scheme,
    ) -> Result<(), MetadataError> {
        self.store.external_types().register(type_name, scheme)
    }

    pub fn resolve_type_by_scheme(&self, scheme_id: SchemeId) -> Option<ExternalTypeBinding> {
        self.store.external_types().resolve_type_by_scheme(scheme_id)
    }

    pub fn resolve_type_by_scheme_name(&self, scheme_name: &str) -> Option<ExternalTypeBinding> {
        self.store
            .external_types()
            .resolve_type_by_scheme_name(scheme_name)
    }

    pub fn resolve_scheme_by_type(&self, type_name: &str) -> Option<SchemeId> {
        self.store.external_types().resolve_scheme_by_type(type_name)
    }

    pub fn statistics(&self) -> MetadataStatistics {
        self.store.statistics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ExternalTypeDescriptor;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MetadataProvider for CountingProvider {
        async fn scheme_by_name(&self, name: &str) -> EavResult<Option<Scheme>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((name == "Invoice").then(|| Scheme::new(1, "Invoice")))
        }
    }

    fn config(domain: &str) -> CacheConfig {
        CacheConfig::new().with_domain(CacheDomain::new(domain).unwrap())
    }

    #[test]
    fn test_facades_share_domain_store() {
        let registry = MetadataRegistry::new();
        let a1 = MetadataCache::new(&registry, &config("a")).unwrap();
        let a2 = MetadataCache::new(&registry, &config("a")).unwrap();
        let b = MetadataCache::new(&registry, &config("b")).unwrap();

        a1.cache_scheme(Scheme::new(1, "Invoice"));

        assert!(a2.scheme_by_id(1).is_some());
        assert!(b.scheme_by_id(1).is_none());
    }

    #[test]
    fn test_first_config_decides_enablement() {
        let registry = MetadataRegistry::new();
        let disabled = MetadataCache::new(&registry, &config("a").with_enabled(false)).unwrap();
        let other = MetadataCache::new(&registry, &config("a")).unwrap();

        assert!(!disabled.is_enabled());
        assert!(!other.is_enabled());

        other.set_enabled(true);
        assert!(disabled.is_enabled());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let registry = MetadataRegistry::new();
        let bad = config("a").with_ttl(Duration::ZERO);
        assert!(MetadataCache::new(&registry, &bad).is_err());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_scheme_or_fetch_hits_provider_once() {
        let registry = MetadataRegistry::new();
        let cache = MetadataCache::new(&registry, &config("a")).unwrap();
        let provider = CountingProvider {
            calls: AtomicUsize::new(0),
        };

        let first = cache.scheme_or_fetch("Invoice", &provider).await.unwrap();
        let second = cache.scheme_or_fetch("Invoice", &provider).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        let missing = cache.scheme_or_fetch("Nope", &provider).await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_registry_survives_disable() {
        let registry = MetadataRegistry::new();
        let cache = MetadataCache::new(&registry, &config("a")).unwrap();
        let provider = CountingProvider {
            calls: AtomicUsize::new(0),
        };
        let catalog = vec![ExternalTypeDescriptor::named("app::Invoice", "Invoice")];

        let report = cache
            .initialize_external_type_registry(&catalog, &provider)
            .await;
        assert_eq!(report.registered, 1);

        cache.set_enabled(false);
        assert_eq!(cache.resolve_scheme_by_type("app::Invoice"), Some(1));
        assert_eq!(cache.resolve_type_by_scheme(1).unwrap().type_name, "app::Invoice");

        cache.clear_all();
        assert!(cache.resolve_scheme_by_type("app::Invoice").is_none());
    }
}
