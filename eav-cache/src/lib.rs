//! EAV Cache - In-process caching for the EAV layer
//!
//! Two independent caches, both partitioned by [`CacheDomain`]:
//!
//! - [`MetadataCache`]: schemes and attribute types by name and id, plus the
//!   external type registry binding host-language types to schemes.
//! - [`ObjectCache`]: hydrated objects, validated by content hash, bounded
//!   by entry count and per-user quotas with fair-share global eviction.
//!
//! Each kind keeps one store per domain in a [`DomainRegistry`]. Facades
//! are cheap handles onto those stores:
//!
//! ```ignore
//! let objects = ObjectRegistry::<EavObject>::new();
//! let cache = ObjectCache::new(&objects, &CacheConfig::from_env()?, Arc::new(NoQuotas))?;
//!
//! let plan = cache.filter_need_to_load(&candidates);
//! for object in storage.load(&plan.to_load)? {
//!     cache.set(object);
//! }
//! ```
//!
//! [`CacheDomain`]: eav_core::CacheDomain

pub mod metadata;
pub mod objects;
pub mod registry;
pub mod stats;

pub use metadata::{
    DomainMetadataStore, ExternalType, ExternalTypeBinding, ExternalTypeDescriptor,
    ExternalTypeRegistry, MetadataCache, MetadataProvider, MetadataRegistry, ScanReport,
    TypeCatalog,
};
pub use objects::{
    BoundedObjectCache, EntrySnapshot, Eviction, EvictionPolicy, FnQuotaResolver, LoadPlan,
    NoQuotas, ObjectCache, ObjectFetcher, ObjectRegistry, QuotaPlan, QuotaResolver,
    QuotaSnapshot, RejectReason, SetOutcome,
};
pub use registry::DomainRegistry;
pub use stats::{CacheStatistics, MetadataStatistics, StatisticsAccumulator};
