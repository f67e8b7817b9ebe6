//! Per-user quota contract.
//!
//! The resolver is an external collaborator that may do blocking I/O and may
//! even read through the object cache itself. The cache therefore never calls
//! it while holding its lock: every quota a `set` could need is resolved up
//! front into a [`QuotaPlan`].
//!
//! Resolution can recurse when the resolver loads its own configuration
//! object through the cache. A resolver breaks that cycle by naming the
//! scheme of that object in [`QuotaResolver::excluded_scheme`]; objects of
//! that scheme are admitted without quota checks.

use eav_core::{QuotaError, SchemeId, UserId, SYSTEM_USER_ID};
use std::collections::HashMap;

/// Current user and per-user quota lookup.
pub trait QuotaResolver: Send + Sync {
    /// User performing the current cache operation.
    fn current_user_id(&self) -> UserId;

    /// Maximum number of objects `user_id` may own. `None` means unbounded.
    fn user_quota(&self, user_id: UserId) -> Result<Option<usize>, QuotaError>;

    /// Whether any user can have a bounded quota. When false the cache skips
    /// quota resolution entirely.
    fn quotas_enabled(&self) -> bool {
        true
    }

    /// Scheme whose objects the resolver loads while resolving quotas.
    fn excluded_scheme(&self) -> Option<SchemeId> {
        None
    }
}

/// Resolver for deployments without quotas: everything runs as the system user.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoQuotas;

impl QuotaResolver for NoQuotas {
    fn current_user_id(&self) -> UserId {
        SYSTEM_USER_ID
    }

    fn user_quota(&self, _user_id: UserId) -> Result<Option<usize>, QuotaError> {
        Ok(None)
    }

    fn quotas_enabled(&self) -> bool {
        false
    }
}

/// Resolver assembled from two closures.
pub struct FnQuotaResolver<U, Q> {
    current_user: U,
    quota: Q,
    excluded_scheme: Option<SchemeId>,
}

impl<U, Q> FnQuotaResolver<U, Q>
where
    U: Fn() -> UserId + Send + Sync,
    Q: Fn(UserId) -> Result<Option<usize>, QuotaError> + Send + Sync,
{
    pub fn new(current_user: U, quota: Q) -> Self {
        Self {
            current_user,
            quota,
            excluded_scheme: None,
        }
    }

    /// Exempt objects of `scheme_id` from quota checks.
    pub fn with_excluded_scheme(mut self, scheme_id: SchemeId) -> Self {
        self.excluded_scheme = Some(scheme_id);
        self
    }
}

impl<U, Q> QuotaResolver for FnQuotaResolver<U, Q>
where
    U: Fn() -> UserId + Send + Sync,
    Q: Fn(UserId) -> Result<Option<usize>, QuotaError> + Send + Sync,
{
    fn current_user_id(&self) -> UserId {
        (self.current_user)()
    }

    fn user_quota(&self, user_id: UserId) -> Result<Option<usize>, QuotaError> {
        (self.quota)(user_id)
    }

    fn excluded_scheme(&self) -> Option<SchemeId> {
        self.excluded_scheme
    }
}

/// Quotas of tracked users, captured before the cache lock is taken.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotaSnapshot {
    quotas: HashMap<UserId, Option<usize>>,
}

impl QuotaSnapshot {
    pub fn insert(&mut self, user: UserId, quota: Option<usize>) {
        self.quotas.insert(user, quota);
    }

    /// Bounded quota of `user`, if known.
    pub fn bounded(&self, user: UserId) -> Option<usize> {
        self.quotas.get(&user).copied().flatten()
    }

    /// Users with a bounded quota.
    pub fn bounded_users(&self) -> impl Iterator<Item = (UserId, usize)> + '_ {
        self.quotas
            .iter()
            .filter_map(|(user, quota)| quota.map(|q| (*user, q)))
    }

    pub fn has_bounded(&self) -> bool {
        self.quotas.values().any(Option::is_some)
    }

    pub fn is_empty(&self) -> bool {
        self.quotas.is_empty()
    }
}

/// Everything `set` needs to know about quotas, resolved outside the lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaPlan {
    pub acting_user: UserId,
    /// `None` when unbounded, excluded, or unresolvable.
    pub acting_quota: Option<usize>,
    pub snapshot: QuotaSnapshot,
}

impl QuotaPlan {
    pub fn unbounded(acting_user: UserId) -> Self {
        Self {
            acting_user,
            acting_quota: None,
            snapshot: QuotaSnapshot::default(),
        }
    }
}

/// Ask the resolver for a quota, degrading failures to "unbounded".
pub(crate) fn resolve_quota(resolver: &dyn QuotaResolver, user: UserId) -> Option<usize> {
    match resolver.user_quota(user) {
        Ok(quota) => quota,
        Err(e) => {
            tracing::warn!(user_id = user, error = %e, "Quota resolution failed, treating as unbounded");
            None
        }
    }
}
