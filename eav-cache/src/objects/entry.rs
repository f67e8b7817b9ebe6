//! A single cached object and its bookkeeping.

use eav_core::{elapsed_between, ContentHash, ObjectId, SchemeId, Timestamp, UserId};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Read-only view of an entry's bookkeeping, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub id: ObjectId,
    pub scheme_id: SchemeId,
    pub hash: ContentHash,
    pub created_at: Timestamp,
    pub last_access_at: Timestamp,
    pub access_count: u64,
    pub owners: HashSet<UserId>,
}

/// One cached object.
///
/// `owners` is never empty: the inserting user becomes the first owner and
/// every later reader or writer is added.
#[derive(Debug)]
pub(crate) struct ObjectCacheEntry<T> {
    pub(crate) id: ObjectId,
    pub(crate) scheme_id: SchemeId,
    pub(crate) hash: ContentHash,
    pub(crate) payload: Arc<T>,
    pub(crate) created_at: Timestamp,
    pub(crate) last_access_at: Timestamp,
    pub(crate) access_count: u64,
    pub(crate) owners: HashSet<UserId>,
}

impl<T> ObjectCacheEntry<T> {
    pub(crate) fn new(
        id: ObjectId,
        scheme_id: SchemeId,
        hash: ContentHash,
        payload: Arc<T>,
        owner: UserId,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            scheme_id,
            hash,
            payload,
            created_at: now,
            last_access_at: now,
            access_count: 0,
            owners: HashSet::from([owner]),
        }
    }

    pub(crate) fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            id: self.id,
            scheme_id: self.scheme_id,
            hash: self.hash,
            created_at: self.created_at,
            last_access_at: self.last_access_at,
            access_count: self.access_count,
            owners: self.owners.clone(),
        }
    }

    pub(crate) fn is_expired(&self, now: Timestamp, ttl: Duration) -> bool {
        elapsed_between(self.created_at, now) >= ttl
    }

    /// Whether a lookup may serve this entry.
    ///
    /// `expected == None` skips the hash comparison.
    pub(crate) fn is_visible(
        &self,
        now: Timestamp,
        ttl: Duration,
        expected: Option<&ContentHash>,
    ) -> bool {
        !self.is_expired(now, ttl) && expected.map_or(true, |hash| *hash == self.hash)
    }

    /// True if `user` is the only owner.
    pub(crate) fn is_sole_owner(&self, user: UserId) -> bool {
        self.owners.len() == 1 && self.owners.contains(&user)
    }

    /// Record a read by `user`.
    pub(crate) fn touch(&mut self, user: UserId, now: Timestamp) {
        self.last_access_at = now;
        self.access_count += 1;
        self.owners.insert(user);
    }

    /// Replace the payload in place. Existing owners are kept.
    pub(crate) fn refresh(
        &mut self,
        payload: Arc<T>,
        hash: ContentHash,
        user: UserId,
        now: Timestamp,
    ) {
        self.payload = payload;
        self.hash = hash;
        self.created_at = now;
        self.last_access_at = now;
        self.owners.insert(user);
    }
}
