//! Packed variable-length id lists backed by size-classed pools.
//!
//! An [`IdArray`] is an 8-byte handle describing a list of entity ids without
//! owning a heap allocation of its own:
//!
//! ```text
//! count == 0   empty, no storage
//! count == 1   the id itself is stored inline in `start`
//! count >= 2   `start` is an offset into the pool of size class ceil(log2(count))
//! ```
//!
//! Pool `k` of an [`IdArrayHeap`] hands out slots of exactly `2^k` ids. A
//! slot is reused through the pool's free list before the pool grows, and
//! pools grow by doubling. Released slots are not cleared; `count` alone
//! decides how many ids of a slot are valid.
//!
//! Appends and removals that stay within one size class mutate the slot in
//! place. Crossing a power-of-two boundary moves the ids into a slot of the
//! neighbouring class and releases the old slot. Removal shifts the trailing
//! ids left so insertion order is preserved.
//!
//! Pools are not thread-safe; they are owned by the single writer that owns
//! the index they back.

use crate::engine::types::EntityId;

/// Number of size classes. Class `k` holds arrays of capacity `2^k`, so the
/// largest array holds `2^(ID_POOL_CLASSES - 1)` ids.
pub const ID_POOL_CLASSES: usize = 32;

/// Handle to a list of entity ids stored in an [`IdArrayHeap`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IdArray {
    start: u32,
    count: u32,
}

impl IdArray {
    /// The canonical empty list.
    pub const EMPTY: IdArray = IdArray { start: 0, count: 0 };

    /// Number of ids in the list.
    #[inline]
    pub fn count(&self) -> usize {
        self.count as usize
    }

    /// Returns `true` if the list holds no ids.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Pool offset for pooled lists, the id itself for single-id lists.
    #[inline]
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Read-only view of the ids, in insertion order minus removals.
    pub fn ids<'a>(&'a self, heap: &'a IdArrayHeap) -> &'a [EntityId] {
        match self.count {
            0 => &[],
            1 => std::slice::from_ref(&self.start),
            count => {
                let pool = &heap.pools[size_class(count as usize)];
                let start = self.start as usize;
                &pool.ids[start..start + count as usize]
            }
        }
    }

    /// Position of `id` in the list.
    pub fn position(&self, id: EntityId, heap: &IdArrayHeap) -> Option<usize> {
        self.ids(heap).iter().position(|&x| x == id)
    }

    /// Appends `id`, moving to the next size class when the count crosses a
    /// power of two.
    pub fn add(&mut self, id: EntityId, heap: &mut IdArrayHeap) {
        let count = self.count as usize;
        match count {
            0 => {
                self.start = id;
            }
            1 => {
                let pool = heap.pool_mut(1);
                let start = pool.allocate();
                let base = start as usize;
                pool.ids[base] = self.start;
                pool.ids[base + 1] = id;
                self.start = start;
            }
            _ => {
                let current = size_class(count);
                let next = size_class(count + 1);
                if current == next {
                    let pool = heap.pool_mut(current);
                    pool.ids[self.start as usize + count] = id;
                } else {
                    let start = heap.relocate(self.start, count, current, next);
                    heap.pools[next].ids[start as usize + count] = id;
                    self.start = start;
                }
            }
        }
        self.count += 1;
    }

    /// Removes the id at `index`, preserving the order of the survivors.
    ///
    /// Shrinking to a single id stores the survivor inline again and releases
    /// the two-id slot.
    ///
    /// ## Panics
    /// Panics if `index >= count`.
    pub fn remove_at(&mut self, index: usize, heap: &mut IdArrayHeap) {
        let count = self.count as usize;
        assert!(index < count, "IdArray index {index} out of bounds (count {count})");
        match count {
            1 => {
                self.start = 0;
            }
            2 => {
                let pool = heap.pool_mut(1);
                let base = self.start as usize;
                let survivor = pool.ids[base + (1 - index)];
                pool.release(self.start);
                self.start = survivor;
            }
            _ => {
                let current = size_class(count);
                let next = size_class(count - 1);
                let base = self.start as usize;
                {
                    let pool = heap.pool_mut(current);
                    pool.ids.copy_within(base + index + 1..base + count, base + index);
                }
                if current != next {
                    self.start = heap.relocate(self.start, count - 1, current, next);
                }
            }
        }
        self.count -= 1;
    }

    /// Removes `id` if present. Returns `true` when an id was removed.
    pub fn remove(&mut self, id: EntityId, heap: &mut IdArrayHeap) -> bool {
        match self.position(id, heap) {
            Some(index) => {
                self.remove_at(index, heap);
                true
            }
            None => false,
        }
    }

    /// Releases the pool slot (if any) and resets the list to empty.
    pub fn clear(&mut self, heap: &mut IdArrayHeap) {
        if self.count >= 2 {
            heap.pool_mut(size_class(self.count as usize)).release(self.start);
        }
        *self = IdArray::EMPTY;
    }
}

/// Size class for a list of `count >= 2` ids: `ceil(log2(count))`.
#[inline]
pub fn size_class(count: usize) -> usize {
    debug_assert!(count >= 2, "size classes start at two ids");
    (usize::BITS - (count - 1).leading_zeros()) as usize
}

/// Arena of fixed-capacity slots for one size class.
#[derive(Debug, Default)]
pub struct IdArrayPool {
    ids: Vec<EntityId>,
    free_starts: Vec<u32>,
    used: usize,
    slot_capacity: usize,
}

impl IdArrayPool {
    fn new(class: usize) -> Self {
        Self {
            ids: Vec::new(),
            free_starts: Vec::new(),
            used: 0,
            slot_capacity: 1 << class,
        }
    }

    /// Capacity of each slot in this pool.
    #[inline]
    pub fn slot_capacity(&self) -> usize {
        self.slot_capacity
    }

    /// Number of slots currently handed out.
    pub fn allocated_slots(&self) -> usize {
        self.used / self.slot_capacity - self.free_starts.len()
    }

    /// Number of released slots waiting for reuse.
    pub fn free_slots(&self) -> usize {
        self.free_starts.len()
    }

    /// Hands out a slot, preferring the free list over growth.
    fn allocate(&mut self) -> u32 {
        if let Some(start) = self.free_starts.pop() {
            return start;
        }
        let start = self.used;
        self.used += self.slot_capacity;
        if self.ids.len() < self.used {
            let grown = (self.ids.len() * 2).max(self.used).max(self.slot_capacity * 4);
            self.ids.resize(grown, 0);
        }
        u32::try_from(start).expect("id pool offset exceeds u32 range")
    }

    fn release(&mut self, start: u32) {
        debug_assert_eq!(start as usize % self.slot_capacity, 0);
        self.free_starts.push(start);
    }
}

/// One [`IdArrayPool`] per size class.
#[derive(Debug)]
pub struct IdArrayHeap {
    pools: Vec<IdArrayPool>,
}

impl Default for IdArrayHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl IdArrayHeap {
    /// Creates a heap with empty pools for every size class.
    pub fn new() -> Self {
        Self {
            pools: (0..ID_POOL_CLASSES).map(IdArrayPool::new).collect(),
        }
    }

    /// Pool of the given size class.
    pub fn pool(&self, class: usize) -> &IdArrayPool {
        &self.pools[class]
    }

    /// Total number of pooled slots handed out across all classes.
    pub fn allocated_slots(&self) -> usize {
        self.pools.iter().map(IdArrayPool::allocated_slots).sum()
    }

    #[inline]
    fn pool_mut(&mut self, class: usize) -> &mut IdArrayPool {
        &mut self.pools[class]
    }

    /// Copies `count` ids from a slot of class `from` into a fresh slot of
    /// class `to` and releases the old slot. Returns the new start offset.
    fn relocate(&mut self, start: u32, count: usize, from: usize, to: usize) -> u32 {
        let new_start = self.pools[to].allocate();
        let src = start as usize;
        let dst = new_start as usize;

        let (source, target) = if from < to {
            let (low, high) = self.pools.split_at_mut(to);
            (&low[from], &mut high[0])
        } else {
            let (low, high) = self.pools.split_at_mut(from);
            (&high[0], &mut low[to])
        };
        target.ids[dst..dst + count].copy_from_slice(&source.ids[src..src + count]);

        self.pools[from].release(start);
        new_start
    }
}
