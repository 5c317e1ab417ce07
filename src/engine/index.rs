//! # Component indexes
//!
//! Inverted indexes kept in sync with component writes.
//!
//! ## Flavors
//! - [`ValueIndex`]: indexed value to the entities currently holding it.
//!   Ordered value types additionally answer range queries through a
//!   [`SortedRangeCache`].
//! - [`EntityIndex`]: referenced entity to the entities whose link component
//!   points at it. Also maintains the `is_owner` / `is_linked` masks on the
//!   [`EntityNodes`] so membership checks never probe the map.
//!
//! ## Discipline
//! `update(id, old, new)` is `remove(id, old)` followed by `add(id, new)` when
//! `old != new` and a no-op otherwise; callers pass the value read from the
//! column before the overwrite. Adding an id already present in its bucket or
//! removing one that is absent is a silent no-op.
//!
//! Each id is stored under at most one key; a key whose last id is removed is
//! dropped from the map. Every key-set change raises the `modified` flag
//! consumed by the range cache.

use std::any::{type_name, Any};
use std::hash::Hash;
use std::marker::PhantomData;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::engine::component::{IndexKind, IndexedComponent, LinkComponent};
use crate::engine::entity::EntityNodes;
use crate::engine::ids::{IdArray, IdArrayHeap};
use crate::engine::range::SortedRangeCache;
use crate::engine::types::EntityId;

/// Value index: `V -> [EntityId]`.
#[derive(Debug)]
pub struct ValueIndex<V> {
    map: FxHashMap<V, IdArray>,
    heap: IdArrayHeap,
    modified: bool,
    range: SortedRangeCache<V>,
}

impl<V> Default for ValueIndex<V> {
    fn default() -> Self {
        Self {
            map: FxHashMap::default(),
            heap: IdArrayHeap::new(),
            modified: false,
            range: SortedRangeCache::default(),
        }
    }
}

impl<V: Clone + Eq + Hash> ValueIndex<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `id` under `value`.
    pub fn add(&mut self, id: EntityId, value: V) {
        let heap = &mut self.heap;
        let ids = self.map.entry(value).or_insert_with(|| {
            self.modified = true;
            IdArray::EMPTY
        });
        if ids.position(id, heap).is_some() {
            trace!(entity = id, "value index add skipped: id already present");
            return;
        }
        ids.add(id, heap);
    }

    /// Unmaps `id` from `value`.
    pub fn remove(&mut self, id: EntityId, value: &V) {
        let Some(ids) = self.map.get_mut(value) else {
            trace!(entity = id, "value index remove skipped: key absent");
            return;
        };
        if !ids.remove(id, &mut self.heap) {
            trace!(entity = id, "value index remove skipped: id absent");
            return;
        }
        if ids.is_empty() {
            self.map.remove(value);
            self.modified = true;
        }
    }

    /// Moves `id` from `old` to `new`; no-op when equal.
    pub fn update(&mut self, id: EntityId, old: &V, new: V) {
        if *old == new {
            return;
        }
        self.remove(id, old);
        self.add(id, new);
    }

    /// Entities holding `value`, in insertion order.
    pub fn lookup(&self, value: &V) -> &[EntityId] {
        match self.map.get(value) {
            Some(ids) => ids.ids(&self.heap),
            None => &[],
        }
    }

    /// Returns `true` if `id` is mapped under `value`.
    pub fn contains(&self, id: EntityId, value: &V) -> bool {
        self.lookup(value).contains(&id)
    }

    /// Distinct keys currently indexed, in arbitrary order.
    pub fn keys(&self) -> impl Iterator<Item = &V> {
        self.map.keys()
    }

    /// Number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.map.len()
    }

    /// Total number of mapped ids.
    pub fn id_count(&self) -> usize {
        self.map.values().map(IdArray::count).sum()
    }

    /// Returns `true` if the key set changed since the last range refresh.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Pool storage backing the id lists.
    pub fn heap(&self) -> &IdArrayHeap {
        &self.heap
    }
}

impl<V: Clone + Ord + Hash> ValueIndex<V> {
    /// Adds to `out` the ids of every key in `[min, max]`.
    pub fn query_range(&mut self, min: &V, max: &V, out: &mut FxHashSet<EntityId>) {
        self.range
            .query_range(&self.map, &self.heap, &mut self.modified, min, max, out);
    }

    /// Ids of every key in `[min, max]`.
    pub fn lookup_range(&mut self, min: &V, max: &V) -> FxHashSet<EntityId> {
        let mut out = FxHashSet::default();
        self.query_range(min, max, &mut out);
        out
    }

    /// Sorted key snapshot, refreshed if stale.
    pub fn sorted_keys(&mut self) -> &[V] {
        self.range.refresh(&self.map, &mut self.modified);
        self.range.keys()
    }
}

/// Entity index: `target -> [owner]` plus the node masks of one indexed type.
#[derive(Debug)]
pub struct EntityIndex {
    map: FxHashMap<EntityId, IdArray>,
    heap: IdArrayHeap,
    mask: u32,
    modified: bool,
}

impl EntityIndex {
    /// Creates an index owning mask bit `bit`.
    pub fn new(bit: u32) -> Self {
        debug_assert!(bit < 32);
        Self {
            map: FxHashMap::default(),
            heap: IdArrayHeap::new(),
            mask: 1 << bit,
            modified: false,
        }
    }

    /// Mask bit owned by this index.
    #[inline]
    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// Records that `owner` links to `target`. Links to dead entities are
    /// ignored.
    pub fn add(&mut self, owner: EntityId, target: EntityId, nodes: &mut EntityNodes) {
        if !nodes.is_alive(target) {
            trace!(owner, target, "entity index add skipped: target not alive");
            return;
        }
        let heap = &mut self.heap;
        let owners = self.map.entry(target).or_insert_with(|| {
            self.modified = true;
            IdArray::EMPTY
        });
        if owners.position(owner, heap).is_some() {
            trace!(owner, target, "entity index add skipped: link already present");
            return;
        }
        owners.add(owner, heap);
        if let Some(node) = nodes.get_mut(owner) {
            node.is_owner |= self.mask;
        }
        if let Some(node) = nodes.get_mut(target) {
            node.is_linked |= self.mask;
        }
    }

    /// Drops the link from `owner` to `target`.
    pub fn remove(&mut self, owner: EntityId, target: EntityId, nodes: &mut EntityNodes) {
        let Some(owners) = self.map.get_mut(&target) else {
            trace!(owner, target, "entity index remove skipped: target absent");
            return;
        };
        if !owners.remove(owner, &mut self.heap) {
            trace!(owner, target, "entity index remove skipped: link absent");
            return;
        }
        if let Some(node) = nodes.get_mut(owner) {
            node.is_owner &= !self.mask;
        }
        if owners.is_empty() {
            self.map.remove(&target);
            self.modified = true;
            if let Some(node) = nodes.get_mut(target) {
                node.is_linked &= !self.mask;
            }
        }
    }

    /// Repoints `owner` from `old` to `new`.
    pub fn update(
        &mut self,
        owner: EntityId,
        old: Option<EntityId>,
        new: Option<EntityId>,
        nodes: &mut EntityNodes,
    ) {
        if old == new {
            return;
        }
        if let Some(old) = old {
            self.remove(owner, old, nodes);
        }
        if let Some(new) = new {
            self.add(owner, new, nodes);
        }
    }

    /// Entities linking to `target`.
    pub fn owners_of(&self, target: EntityId) -> &[EntityId] {
        match self.map.get(&target) {
            Some(owners) => owners.ids(&self.heap),
            None => &[],
        }
    }

    /// Number of distinct targets.
    pub fn target_count(&self) -> usize {
        self.map.len()
    }

    /// Distinct targets currently linked.
    pub fn targets(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.map.keys().copied()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }
}

/// Object-safe index of one component type, driven by the store with
/// type-erased component values.
pub trait ErasedIndex: Any + Send + Sync {
    /// Index flavor.
    fn kind(&self) -> IndexKind;

    /// Name of the indexed component type.
    fn component_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// `component` was attached to `id`.
    fn on_add(&mut self, id: EntityId, component: &dyn Any, nodes: &mut EntityNodes);

    /// `component` was detached from `id`.
    fn on_remove(&mut self, id: EntityId, component: &dyn Any, nodes: &mut EntityNodes);

    /// The component of `id` was overwritten.
    fn on_update(&mut self, id: EntityId, old: &dyn Any, new: &dyn Any, nodes: &mut EntityNodes);

    /// Entities whose link points at `target`. Empty for value indexes.
    fn referencing_entities(&self, target: EntityId) -> Vec<EntityId>;

    /// Entity `component` links to, if this is a link index and `component`
    /// is a set link of its type.
    fn link_target(&self, _component: &dyn Any) -> Option<EntityId> {
        None
    }
}

/// Constructor of an empty erased index owning mask bit `bit`.
pub type IndexFactory = fn(bit: u32) -> Box<dyn ErasedIndex>;

fn downcast<T: 'static>(component: &dyn Any) -> &T {
    component
        .downcast_ref::<T>()
        .unwrap_or_else(|| panic!("index received a value that is not `{}`", type_name::<T>()))
}

/// [`ValueIndex`] over [`IndexedComponent::Value`] of component `T`.
pub struct ComponentValueIndex<T: IndexedComponent> {
    pub index: ValueIndex<T::Value>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: IndexedComponent> Default for ComponentValueIndex<T> {
    fn default() -> Self {
        Self { index: ValueIndex::new(), _marker: PhantomData }
    }
}

impl<T: IndexedComponent> ErasedIndex for ComponentValueIndex<T> {
    fn kind(&self) -> IndexKind {
        IndexKind::Value
    }

    fn component_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn on_add(&mut self, id: EntityId, component: &dyn Any, _nodes: &mut EntityNodes) {
        self.index.add(id, downcast::<T>(component).indexed_value());
    }

    fn on_remove(&mut self, id: EntityId, component: &dyn Any, _nodes: &mut EntityNodes) {
        self.index.remove(id, &downcast::<T>(component).indexed_value());
    }

    fn on_update(&mut self, id: EntityId, old: &dyn Any, new: &dyn Any, _nodes: &mut EntityNodes) {
        let old = downcast::<T>(old).indexed_value();
        self.index.update(id, &old, downcast::<T>(new).indexed_value());
    }

    fn referencing_entities(&self, _target: EntityId) -> Vec<EntityId> {
        Vec::new()
    }
}

/// [`EntityIndex`] over [`LinkComponent::target`] of component `T`.
pub struct EntityLinkIndex<T: LinkComponent> {
    pub index: EntityIndex,
    _marker: PhantomData<fn() -> T>,
}

impl<T: LinkComponent> EntityLinkIndex<T> {
    pub fn new(bit: u32) -> Self {
        Self { index: EntityIndex::new(bit), _marker: PhantomData }
    }
}

impl<T: LinkComponent> ErasedIndex for EntityLinkIndex<T> {
    fn kind(&self) -> IndexKind {
        IndexKind::EntityLink
    }

    fn component_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn on_add(&mut self, id: EntityId, component: &dyn Any, nodes: &mut EntityNodes) {
        if let Some(target) = downcast::<T>(component).target() {
            self.index.add(id, target, nodes);
        }
    }

    fn on_remove(&mut self, id: EntityId, component: &dyn Any, nodes: &mut EntityNodes) {
        if let Some(target) = downcast::<T>(component).target() {
            self.index.remove(id, target, nodes);
        }
    }

    fn on_update(&mut self, id: EntityId, old: &dyn Any, new: &dyn Any, nodes: &mut EntityNodes) {
        let old = downcast::<T>(old).target();
        let new = downcast::<T>(new).target();
        self.index.update(id, old, new, nodes);
    }

    fn referencing_entities(&self, target: EntityId) -> Vec<EntityId> {
        self.index.owners_of(target).to_vec()
    }

    fn link_target(&self, component: &dyn Any) -> Option<EntityId> {
        component.downcast_ref::<T>().and_then(T::target)
    }
}

/// [`IndexFactory`] for a value-indexed component.
pub fn new_value_index<T: IndexedComponent>(_bit: u32) -> Box<dyn ErasedIndex> {
    Box::new(ComponentValueIndex::<T>::default())
}

/// [`IndexFactory`] for a link component.
pub fn new_link_index<T: LinkComponent>(bit: u32) -> Box<dyn ErasedIndex> {
    Box::new(EntityLinkIndex::<T>::new(bit))
}
