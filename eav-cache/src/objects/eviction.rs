//! Eviction policies.
//!
//! Two tiers:
//!
//! - **Per-user**: when a user hits their quota, drop that user's least
//!   recently accessed object among those they own alone. Objects shared with
//!   other users are never taken, since that would silently break access for
//!   the other owners.
//! - **Global**: when the cache is full, pick a victim user fairly from the
//!   quota snapshot (largest overrun first, then highest usage/quota ratio)
//!   and run the per-user policy on them. Without usable quota information,
//!   fall back to evicting the oldest entry by creation time.
//!
//! Global eviction only fails when the cache is empty.

use eav_core::{ObjectId, UserId};
use std::cmp::Ordering;

use super::quota::QuotaSnapshot;
use super::state::CacheState;

/// Which rule picked the victim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// The inserting user was at quota.
    UserQuota,
    /// The victim's owner exceeded their quota the most.
    OverQuota,
    /// The victim's owner had the highest usage/quota ratio.
    Greediness,
    /// Oldest entry in the cache.
    Fifo,
}

/// A completed eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eviction {
    pub object_id: ObjectId,
    /// User whose quota pressure caused the eviction; `None` for FIFO.
    pub user_id: Option<UserId>,
    pub policy: EvictionPolicy,
}

impl<T> CacheState<T> {
    /// Evict `user`'s least recently accessed solely owned object.
    pub(crate) fn evict_for_user(&mut self, user: UserId) -> Option<ObjectId> {
        let victim = self
            .ownership
            .get(&user)?
            .iter()
            .filter_map(|id| self.entries.get(id))
            .filter(|entry| entry.is_sole_owner(user))
            .min_by_key(|entry| (entry.last_access_at, entry.id))?
            .id;
        self.remove(victim);
        Some(victim)
    }

    /// Free one slot using the fair-share policy.
    pub(crate) fn evict_global(&mut self, snapshot: &QuotaSnapshot) -> Option<Eviction> {
        if self.entries.is_empty() {
            return None;
        }

        for user in self.over_quota_users(snapshot) {
            if let Some(object_id) = self.evict_for_user(user) {
                return Some(Eviction {
                    object_id,
                    user_id: Some(user),
                    policy: EvictionPolicy::OverQuota,
                });
            }
        }

        for user in self.greediest_users(snapshot) {
            if let Some(object_id) = self.evict_for_user(user) {
                return Some(Eviction {
                    object_id,
                    user_id: Some(user),
                    policy: EvictionPolicy::Greediness,
                });
            }
        }

        let object_id = self.evict_oldest()?;
        Some(Eviction {
            object_id,
            user_id: None,
            policy: EvictionPolicy::Fifo,
        })
    }

    /// Bounded users owning more than their quota, largest overrun first.
    fn over_quota_users(&self, snapshot: &QuotaSnapshot) -> Vec<UserId> {
        let mut over: Vec<(UserId, usize)> = snapshot
            .bounded_users()
            .filter_map(|(user, quota)| {
                let count = self.owned_count(user);
                (count > quota).then(|| (user, count - quota))
            })
            .collect();
        over.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        over.into_iter().map(|(user, _)| user).collect()
    }

    /// Bounded users by descending usage/quota, ties to the larger owner.
    ///
    /// Unbounded users never appear, which keeps system accounts out of
    /// this path.
    fn greediest_users(&self, snapshot: &QuotaSnapshot) -> Vec<UserId> {
        let mut ranked: Vec<(UserId, f64, usize)> = snapshot
            .bounded_users()
            .filter_map(|(user, quota)| {
                let count = self.owned_count(user);
                if count == 0 {
                    return None;
                }
                let greediness = if quota == 0 {
                    f64::INFINITY
                } else {
                    count as f64 / quota as f64
                };
                Some((user, greediness, count))
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then(b.2.cmp(&a.2))
                .then(a.0.cmp(&b.0))
        });
        ranked.into_iter().map(|(user, _, _)| user).collect()
    }

    /// Evict the entry created first.
    fn evict_oldest(&mut self) -> Option<ObjectId> {
        let victim = self
            .entries
            .values()
            .min_by(|a, b| match a.created_at.cmp(&b.created_at) {
                Ordering::Equal => a.id.cmp(&b.id),
                other => other,
            })?
            .id;
        self.remove(victim);
        Some(victim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::entry::ObjectCacheEntry;
    use eav_core::{compute_content_hash, Clock, ManualClock};
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixture {
        state: CacheState<u32>,
        clock: ManualClock,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                state: CacheState::default(),
                clock: ManualClock::starting_now(),
            }
        }

        /// Insert `id` owned by `owners[0]`, then add the remaining owners.
        fn put(&mut self, id: ObjectId, owners: &[UserId]) {
            self.clock.advance(Duration::from_millis(10));
            let hash = compute_content_hash(&id.to_le_bytes());
            let mut entry =
                ObjectCacheEntry::new(id, 1, hash, Arc::new(id as u32), owners[0], self.clock.now());
            for owner in &owners[1..] {
                entry.owners.insert(*owner);
            }
            self.state.insert(entry);
        }

        fn read(&mut self, id: ObjectId, user: UserId) {
            self.clock.advance(Duration::from_millis(10));
            let now = self.clock.now();
            if let Some(entry) = self.state.entries.get_mut(&id) {
                entry.touch(user, now);
            }
            self.state.record_owner(user, id);
        }
    }

    fn snapshot(quotas: &[(UserId, Option<usize>)]) -> QuotaSnapshot {
        let mut snapshot = QuotaSnapshot::default();
        for (user, quota) in quotas {
            snapshot.insert(*user, *quota);
        }
        snapshot
    }

    #[test]
    fn test_per_user_picks_least_recently_accessed() {
        let mut f = Fixture::new();
        f.put(1, &[7]);
        f.put(2, &[7]);
        f.put(3, &[7]);
        f.read(1, 7);

        assert_eq!(f.state.evict_for_user(7), Some(2));
        assert!(f.state.is_consistent());
        assert_eq!(f.state.owned_count(7), 2);
    }

    #[test]
    fn test_per_user_skips_shared_objects() {
        let mut f = Fixture::new();
        f.put(1, &[7, 8]);
        f.put(2, &[7, 8]);

        assert_eq!(f.state.evict_for_user(7), None);
        assert_eq!(f.state.entries.len(), 2);

        f.put(3, &[7]);
        assert_eq!(f.state.evict_for_user(7), Some(3));
    }

    #[test]
    fn test_per_user_unknown_user_fails() {
        let mut f = Fixture::new();
        f.put(1, &[7]);
        assert_eq!(f.state.evict_for_user(99), None);
    }

    #[test]
    fn test_global_prefers_largest_overrun() {
        let mut f = Fixture::new();
        for id in 1..=4 {
            f.put(id, &[1]);
        }
        for id in 10..=15 {
            f.put(id, &[2]);
        }
        // user 1: 4 of 3 (+1), user 2: 6 of 3 (+3)
        let quotas = snapshot(&[(1, Some(3)), (2, Some(3))]);

        let eviction = f.state.evict_global(&quotas).unwrap();
        assert_eq!(eviction.policy, EvictionPolicy::OverQuota);
        assert_eq!(eviction.user_id, Some(2));
        assert_eq!(eviction.object_id, 10);
    }

    #[test]
    fn test_global_uses_greediness_when_nobody_over() {
        let mut f = Fixture::new();
        for id in 1..=2 {
            f.put(id, &[1]);
        }
        for id in 10..=13 {
            f.put(id, &[2]);
        }
        // user 1: 2/10 = 0.2, user 2: 4/5 = 0.8
        let quotas = snapshot(&[(1, Some(10)), (2, Some(5))]);

        let eviction = f.state.evict_global(&quotas).unwrap();
        assert_eq!(eviction.policy, EvictionPolicy::Greediness);
        assert_eq!(eviction.user_id, Some(2));
    }

    #[test]
    fn test_greediness_tie_goes_to_larger_owner() {
        let mut f = Fixture::new();
        for id in 1..=10 {
            f.put(id, &[1]);
        }
        for id in 20..=24 {
            f.put(id, &[2]);
        }
        let quotas = snapshot(&[(1, Some(10)), (2, Some(5))]);

        let eviction = f.state.evict_global(&quotas).unwrap();
        assert_eq!(eviction.user_id, Some(1));
        assert_eq!(eviction.object_id, 1);
    }

    #[test]
    fn test_unbounded_users_protected_from_greediness() {
        let mut f = Fixture::new();
        f.put(1, &[0]);
        f.put(2, &[5]);
        let quotas = snapshot(&[(0, None), (5, Some(100))]);

        let eviction = f.state.evict_global(&quotas).unwrap();
        assert_eq!(eviction.user_id, Some(5));
        assert_eq!(eviction.object_id, 2);
    }

    #[test]
    fn test_fifo_without_quota_information() {
        let mut f = Fixture::new();
        f.put(1, &[0]);
        f.put(2, &[0]);
        f.read(1, 0);

        let eviction = f.state.evict_global(&QuotaSnapshot::default()).unwrap();
        assert_eq!(eviction.policy, EvictionPolicy::Fifo);
        assert_eq!(eviction.object_id, 1);
        assert!(f.state.is_consistent());
    }

    #[test]
    fn test_fifo_fallback_removes_shared_entry_from_all_owners() {
        let mut f = Fixture::new();
        f.put(1, &[7, 8]);
        f.put(2, &[7, 8]);
        // Both bounded users only own shared objects
        let quotas = snapshot(&[(7, Some(1)), (8, Some(1))]);

        let eviction = f.state.evict_global(&quotas).unwrap();
        assert_eq!(eviction.policy, EvictionPolicy::Fifo);
        assert_eq!(eviction.object_id, 1);
        assert_eq!(f.state.owned_count(7), 1);
        assert_eq!(f.state.owned_count(8), 1);
        assert!(f.state.is_consistent());
    }

    #[test]
    fn test_global_fails_only_when_empty() {
        let mut state: CacheState<u32> = CacheState::default();
        assert!(state.evict_global(&QuotaSnapshot::default()).is_none());
    }
}
