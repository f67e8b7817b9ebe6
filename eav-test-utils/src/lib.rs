//! EAV Test Utilities
//!
//! Shared test infrastructure for the EAV cache workspace:
//! - Fixtures for hashed objects and schemes
//! - Proptest generators
//! - Mock metadata provider and object fetcher
//! - A scripted quota resolver

pub use eav_cache::{
    CacheStatistics, MetadataProvider, ObjectFetcher, QuotaResolver, SetOutcome,
};
pub use eav_core::{
    compute_content_hash, CacheConfig, CacheDomain, ContentHash, EavObject, EavResult,
    MetadataError, ObjectId, QuotaError, Scheme, SchemeId, Structure, TypeInfo, UserId,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;

    /// Hashed object with a deterministic name in scheme 1.
    pub fn hashed_object(id: ObjectId) -> EavObject {
        hashed_object_in(id, 1)
    }

    pub fn hashed_object_in(id: ObjectId, scheme_id: SchemeId) -> EavObject {
        EavObject::new(id, scheme_id, format!("object-{id}"))
            .with_value("seq", serde_json::json!(id))
            .hashed()
    }

    /// Candidate pair for `filter_need_to_load` matching [`hashed_object`].
    pub fn candidate(id: ObjectId) -> (ObjectId, ContentHash) {
        let hash = hashed_object(id)
            .hash
            .unwrap_or_else(|| compute_content_hash(&id.to_le_bytes()));
        (id, hash)
    }

    pub fn config(domain: &str) -> CacheConfig {
        CacheConfig::new().with_domain(domain_name(domain))
    }

    /// Domain from a literal known to be valid.
    pub fn domain_name(name: &str) -> CacheDomain {
        CacheDomain::new(name).unwrap_or_default()
    }

    /// Scheme with a single required string attribute.
    pub fn invoice_scheme(id: SchemeId) -> Scheme {
        Scheme::new(id, "Invoice").with_structure(Structure {
            id: id * 100,
            scheme_id: id,
            name: "number".to_string(),
            type_id: 1,
            is_array: false,
            is_required: true,
        })
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;

    pub fn arb_object_id() -> impl Strategy<Value = ObjectId> {
        1i64..10_000
    }

    pub fn arb_content_hash() -> impl Strategy<Value = ContentHash> {
        any::<[u8; 32]>().prop_map(ContentHash::from_bytes)
    }

    pub fn arb_scheme_name() -> impl Strategy<Value = String> {
        "[A-Z][a-z]{2,12}"
    }

    pub fn arb_eav_object() -> impl Strategy<Value = EavObject> {
        (
            arb_object_id(),
            1i64..50,
            arb_scheme_name(),
            proptest::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..5),
        )
            .prop_map(|(id, scheme_id, name, values)| {
                values
                    .into_iter()
                    .fold(EavObject::new(id, scheme_id, name), |obj, (k, v)| {
                        obj.with_value(k, serde_json::json!(v))
                    })
                    .hashed()
            })
    }

    pub fn arb_scheme() -> impl Strategy<Value = Scheme> {
        (1i64..1_000, arb_scheme_name()).prop_map(|(id, name)| Scheme::new(id, name))
    }
}

// ============================================================================
// MOCK PROVIDERS
// ============================================================================

/// In-memory metadata provider that counts lookups.
#[derive(Debug, Default)]
pub struct MockMetadataProvider {
    schemes: HashMap<String, Scheme>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl MockMetadataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.schemes.insert(scheme.name.clone(), scheme);
        self
    }

    /// Make lookups of `name` fail.
    pub fn failing_on(mut self, name: impl Into<String>) -> Self {
        self.failing.insert(name.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataProvider for MockMetadataProvider {
    async fn scheme_by_name(&self, name: &str) -> EavResult<Option<Scheme>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(name) {
            return Err(MetadataError::LookupFailed {
                name: name.to_string(),
                reason: "mock failure".to_string(),
            }
            .into());
        }
        Ok(self.schemes.get(name).cloned())
    }
}

/// Object fetcher backed by a fixed set of objects.
#[derive(Debug, Default)]
pub struct MockObjectStore {
    objects: HashMap<ObjectId, EavObject>,
    requests: Mutex<Vec<HashSet<ObjectId>>>,
}

impl MockObjectStore {
    pub fn new(objects: impl IntoIterator<Item = EavObject>) -> Self {
        Self {
            objects: objects.into_iter().map(|obj| (obj.id, obj)).collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Id sets requested so far, in call order.
    pub fn requests(&self) -> Vec<HashSet<ObjectId>> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ObjectFetcher<EavObject> for MockObjectStore {
    async fn fetch(&self, ids: &HashSet<ObjectId>) -> EavResult<Vec<EavObject>> {
        self.requests.lock().push(ids.clone());
        Ok(ids
            .iter()
            .filter_map(|id| self.objects.get(id).cloned())
            .collect())
    }
}

// ============================================================================
// QUOTA RESOLVER
// ============================================================================

/// Quota resolver whose acting user and quotas are switched by the test.
///
/// Users without an explicit quota are unbounded.
#[derive(Debug, Default)]
pub struct ScriptedQuotas {
    user: Mutex<UserId>,
    quotas: Mutex<HashMap<UserId, usize>>,
    failing: Mutex<bool>,
    excluded_scheme: Mutex<Option<SchemeId>>,
    lookups: AtomicUsize,
}

impl ScriptedQuotas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn act_as(&self, user: UserId) {
        *self.user.lock() = user;
    }

    pub fn set_quota(&self, user: UserId, quota: usize) {
        self.quotas.lock().insert(user, quota);
    }

    /// Make every quota lookup fail.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn exclude_scheme(&self, scheme_id: SchemeId) {
        *self.excluded_scheme.lock() = Some(scheme_id);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl QuotaResolver for ScriptedQuotas {
    fn current_user_id(&self) -> UserId {
        *self.user.lock()
    }

    fn user_quota(&self, user_id: UserId) -> Result<Option<usize>, QuotaError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if *self.failing.lock() {
            return Err(QuotaError::ResolutionFailed {
                user_id,
                reason: "scripted failure".to_string(),
            });
        }
        Ok(self.quotas.lock().get(&user_id).copied())
    }

    fn excluded_scheme(&self) -> Option<SchemeId> {
        *self.excluded_scheme.lock()
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

/// Assert the cache statistics report the given hit and miss counts.
pub fn assert_lookups(stats: &CacheStatistics, hits: u64, misses: u64) {
    assert_eq!(
        (stats.hits, stats.misses),
        (hits, misses),
        "unexpected hit/miss counts in {stats:?}"
    );
}

/// Assert an insert was admitted.
pub fn assert_cached(outcome: SetOutcome) {
    assert!(outcome.is_cached(), "object was not cached: {outcome:?}");
}
