/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::operators::PhysicalNode;
use crate::Digest;
use log::trace;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Snapshot of the cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
}

#[derive(Default)]
struct Entries {
    plans: FxHashMap<Digest, Arc<PhysicalNode>>,
    /// Insertion order, oldest first.
    order: VecDeque<Digest>,
}

/// Bounded map from logical plan digests to physical plans, shared by all
/// queries of a catalogue. The oldest entry is evicted first.
pub struct PlanCache {
    capacity: usize,
    entries: RwLock<Entries>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl PlanCache {
    /// A capacity of 0 disables caching.
    pub fn new(capacity: usize) -> Self {
        PlanCache {
            capacity,
            entries: RwLock::new(Entries::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, digest: Digest) -> Option<Arc<PhysicalNode>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        match entries.plans.get(&digest) {
            Some(plan) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!("plan cache hit for {:016x}", digest);
                Some(plan.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!("plan cache miss for {:016x}", digest);
                None
            }
        }
    }

    pub fn set(&self, digest: Digest, plan: Arc<PhysicalNode>) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.plans.insert(digest, plan).is_some() {
            return;
        }
        entries.order.push_back(digest);
        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.plans.remove(&oldest);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                trace!("evicted plan {:016x} from plan cache", oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .plans
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.plans.clear();
        entries.order.clear();
    }

    pub fn stats(&self) -> PlanCacheStats {
        PlanCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size: self.len(),
        }
    }
}

impl std::fmt::Debug for PlanCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanCache")
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::operators::PlanNode;
    use crate::test_support::Fixture;

    #[test]
    fn test_hits_and_misses() {
        let fixture = Fixture::new(1);
        let plan = fixture.physical_scan(0, &[fixture.id()]);
        let cache = PlanCache::new(10);
        assert!(cache.get(1).is_none());
        cache.set(1, plan.clone());
        assert_eq!(cache.get(1).unwrap().digest(), plan.digest());
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.size), (1, 1, 1));
    }

    #[test]
    fn test_oldest_entry_is_evicted() {
        let fixture = Fixture::new(1);
        let plan = fixture.physical_scan(0, &[fixture.id()]);
        let cache = PlanCache::new(2);
        cache.set(1, plan.clone());
        cache.set(2, plan.clone());
        cache.set(1, plan.clone());
        cache.set(3, plan);
        assert!(cache.get(1).is_none());
        assert!(cache.get(2).is_some());
        assert!(cache.get(3).is_some());
        assert_eq!(cache.stats().evictions, 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_evictions_follow_insertion_order() {
        let fixture = Fixture::new(1);
        let plan = fixture.physical_scan(0, &[fixture.id()]);
        let cache = PlanCache::new(3);
        for digest in 1..=3 {
            cache.set(digest, plan.clone());
        }
        // Re-setting does not refresh the age of an entry.
        cache.set(1, plan.clone());
        cache.set(4, plan.clone());
        assert!(cache.get(1).is_none());
        assert!(cache.get(2).is_some());

        for digest in 5..=6 {
            cache.set(digest, plan.clone());
        }
        for digest in 1..=3 {
            assert!(cache.get(digest).is_none(), "{} should be evicted", digest);
        }
        for digest in 4..=6 {
            assert!(cache.get(digest).is_some(), "{} should be cached", digest);
        }
        let stats = cache.stats();
        assert_eq!((stats.evictions, stats.size), (3, 3));
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let fixture = Fixture::new(1);
        let cache = PlanCache::new(0);
        cache.set(1, fixture.physical_scan(0, &[fixture.id()]));
        assert!(cache.get(1).is_none());
        assert_eq!(cache.len(), 0);
    }
}
