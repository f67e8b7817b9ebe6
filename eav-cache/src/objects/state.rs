//! Lock-protected object cache state: entries plus the ownership index.
//!
//! `ownership[user]` always equals the set of entry ids whose `owners`
//! contain `user`. Users owning nothing are dropped from the index.

use eav_core::{ObjectId, UserId};
use std::collections::{HashMap, HashSet};

use super::entry::ObjectCacheEntry;

#[derive(Debug)]
pub(crate) struct CacheState<T> {
    pub(crate) entries: HashMap<ObjectId, ObjectCacheEntry<T>>,
    pub(crate) ownership: HashMap<UserId, HashSet<ObjectId>>,
}

impl<T> Default for CacheState<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            ownership: HashMap::new(),
        }
    }
}

impl<T> CacheState<T> {
    pub(crate) fn insert(&mut self, entry: ObjectCacheEntry<T>) {
        let id = entry.id;
        for owner in &entry.owners {
            self.ownership.entry(*owner).or_default().insert(id);
        }
        self.entries.insert(id, entry);
    }

    pub(crate) fn record_owner(&mut self, user: UserId, id: ObjectId) {
        self.ownership.entry(user).or_default().insert(id);
    }

    /// Remove an entry and unlink it from every owner.
    pub(crate) fn remove(&mut self, id: ObjectId) -> Option<ObjectCacheEntry<T>> {
        let entry = self.entries.remove(&id)?;
        for owner in &entry.owners {
            if let Some(owned) = self.ownership.get_mut(owner) {
                owned.remove(&id);
                if owned.is_empty() {
                    self.ownership.remove(owner);
                }
            }
        }
        Some(entry)
    }

    pub(crate) fn owned_count(&self, user: UserId) -> usize {
        self.ownership.get(&user).map_or(0, HashSet::len)
    }

    pub(crate) fn tracked_users(&self) -> Vec<UserId> {
        self.ownership.keys().copied().collect()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.ownership.clear();
    }

    /// Check the ownership index against the entries. Test helper.
    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        let from_entries = self.entries.values().all(|entry| {
            !entry.owners.is_empty()
                && entry
                    .owners
                    .iter()
                    .all(|owner| self.ownership.get(owner).is_some_and(|ids| ids.contains(&entry.id)))
        });
        let from_index = self.ownership.iter().all(|(user, ids)| {
            !ids.is_empty()
                && ids.iter().all(|id| {
                    self.entries
                        .get(id)
                        .is_some_and(|entry| entry.owners.contains(user))
                })
        });
        from_entries && from_index
    }
}
