//! Read-through loading on top of the object cache.
//!
//! Wraps the bulk load path: filter candidates through the cache, fetch the
//! misses from storage in one call, push the fetched objects back.

use async_trait::async_trait;
use eav_core::{CacheableObject, ContentHash, EavResult, ObjectId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::facade::ObjectCache;

/// Storage-side loader for objects the cache could not serve.
#[async_trait]
pub trait ObjectFetcher<T: Send + 'static>: Send + Sync {
    /// Load the objects with the given ids. Ids that no longer exist are
    /// simply absent from the result.
    async fn fetch(&self, ids: &HashSet<ObjectId>) -> EavResult<Vec<T>>;
}

impl<T: CacheableObject> ObjectCache<T> {
    /// Resolve `candidates` through the cache, loading misses via `fetcher`.
    ///
    /// Fetched objects are cached (subject to the usual admission rules)
    /// and returned alongside the hits. A fetcher error aborts the load; the
    /// cache is left as it was before the fetch.
    pub async fn load_through<F>(
        &self,
        candidates: &[(ObjectId, ContentHash)],
        fetcher: &F,
    ) -> EavResult<HashMap<ObjectId, Arc<T>>>
    where
        F: ObjectFetcher<T> + ?Sized,
    {
        let plan = self.filter_need_to_load(candidates);
        let mut loaded = plan.hits;
        if plan.to_load.is_empty() {
            return Ok(loaded);
        }

        let fetched = fetcher.fetch(&plan.to_load).await?;
        tracing::debug!(
            domain = %self.domain(),
            requested = plan.to_load.len(),
            fetched = fetched.len(),
            "Loaded objects missing from cache"
        );

        for object in fetched {
            let object = Arc::new(object);
            self.set_shared(Arc::clone(&object));
            loaded.insert(object.object_id(), object);
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::facade::ObjectRegistry;
    use crate::objects::quota::NoQuotas;
    use eav_core::{CacheConfig, EavObject, MetadataError};
    use parking_lot::Mutex;

    struct RecordingFetcher {
        requests: Mutex<Vec<HashSet<ObjectId>>>,
        fail: bool,
    }

    impl RecordingFetcher {
        fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl ObjectFetcher<EavObject> for RecordingFetcher {
        async fn fetch(&self, ids: &HashSet<ObjectId>) -> EavResult<Vec<EavObject>> {
            self.requests.lock().push(ids.clone());
            if self.fail {
                return Err(MetadataError::LookupFailed {
                    name: "objects".to_string(),
                    reason: "storage offline".to_string(),
                }
                .into());
            }
            Ok(ids.iter().map(|id| object(*id)).collect())
        }
    }

    fn object(id: ObjectId) -> EavObject {
        EavObject::new(id, 1, format!("object-{id}")).hashed()
    }

    fn candidate(id: ObjectId) -> (ObjectId, ContentHash) {
        (id, object(id).hash.unwrap())
    }

    #[tokio::test]
    async fn test_load_through_fetches_only_misses() {
        let registry = ObjectRegistry::new();
        let cache = ObjectCache::new(&registry, &CacheConfig::new(), Arc::new(NoQuotas)).unwrap();
        cache.set(object(1));
        let fetcher = RecordingFetcher::new();

        let loaded = cache
            .load_through(&[candidate(1), candidate(2), candidate(3)], &fetcher)
            .await
            .unwrap();

        assert_eq!(loaded.len(), 3);
        assert_eq!(*fetcher.requests.lock(), vec![HashSet::from([2, 3])]);
        assert!(cache.contains(2) && cache.contains(3));

        // Second pass is served entirely from cache
        cache
            .load_through(&[candidate(1), candidate(2)], &fetcher)
            .await
            .unwrap();
        assert_eq!(fetcher.requests.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_load_through_propagates_fetch_errors() {
        let registry = ObjectRegistry::new();
        let cache = ObjectCache::new(&registry, &CacheConfig::new(), Arc::new(NoQuotas)).unwrap();
        let fetcher = RecordingFetcher {
            fail: true,
            ..RecordingFetcher::new()
        };

        let result = cache.load_through(&[candidate(1)], &fetcher).await;
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_load_through_when_disabled_still_loads() {
        let registry = ObjectRegistry::new();
        let config = CacheConfig::new().with_enabled(false);
        let cache = ObjectCache::new(&registry, &config, Arc::new(NoQuotas)).unwrap();
        let fetcher = RecordingFetcher::new();

        let loaded = cache
            .load_through(&[candidate(1)], &fetcher)
            .await
            .unwrap();

        assert!(loaded.contains_key(&1));
        assert!(cache.is_empty());
    }
}
