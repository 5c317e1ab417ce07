//! Sorted key cache for range queries over a value index.
//!
//! The cache keeps a reusable buffer of every key of the owning index. The
//! buffer is refreshed (collected and sorted) only when the index reports
//! that its key set changed since the last refresh, so repeated range queries
//! between mutations cost two binary searches each.

use std::hash::Hash;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::engine::ids::{IdArray, IdArrayHeap};
use crate::engine::types::EntityId;

/// Sorted snapshot of an index's keys.
#[derive(Debug)]
pub struct SortedRangeCache<V> {
    keys: Vec<V>,
}

impl<V> Default for SortedRangeCache<V> {
    fn default() -> Self {
        Self { keys: Vec::new() }
    }
}

impl<V: Ord + Clone + Eq + Hash> SortedRangeCache<V> {
    /// Current sorted keys. Stale until the next [`refresh`](Self::refresh).
    pub fn keys(&self) -> &[V] {
        &self.keys
    }

    /// Rebuilds the buffer from `map` if `modified` is set, then clears it.
    pub fn refresh(&mut self, map: &FxHashMap<V, IdArray>, modified: &mut bool) {
        if !*modified {
            return;
        }
        self.keys.clear();
        self.keys.extend(map.keys().cloned());
        self.keys.sort_unstable();
        *modified = false;
    }

    /// Adds to `out` the ids of every key in `[min, max]`.
    pub fn query_range(
        &mut self,
        map: &FxHashMap<V, IdArray>,
        heap: &IdArrayHeap,
        modified: &mut bool,
        min: &V,
        max: &V,
        out: &mut FxHashSet<EntityId>,
    ) {
        self.refresh(map, modified);
        let lower = lower_bound(&self.keys, min);
        let upper = upper_bound(&self.keys, max);
        if lower >= upper {
            return;
        }
        for key in &self.keys[lower..upper] {
            if let Some(ids) = map.get(key) {
                out.extend(ids.ids(heap).iter().copied());
            }
        }
    }
}

/// Index of the first key `>= min`.
pub fn lower_bound<V: Ord>(keys: &[V], min: &V) -> usize {
    keys.partition_point(|key| key < min)
}

/// Index of the first key `> max`.
pub fn upper_bound<V: Ord>(keys: &[V], max: &V) -> usize {
    keys.partition_point(|key| key <= max)
}
