//! Typed archetype queries.
//!
//! An [`ArchetypeQuery<Q>`] selects every archetype that stores all
//! components of the tuple `Q` and passes the query's tag / component
//! refinements, then exposes their data chunk by chunk.
//!
//! ## Matching
//! The matched archetype list is cached inside the query. Archetypes are only
//! ever appended to a store, so each refresh tests just the archetypes created
//! since the previous one. Refining the signature resets the cache.
//!
//! ## Enumeration order
//! Matched archetypes in creation order, and within each archetype its chunks
//! in storage order. Empty archetypes yield no chunks.
//!
//! ## Writes
//! [`ArchetypeQuery::for_each`] hands out `&mut` slices, so it refuses
//! value-indexed and link components. Read them through
//! [`ArchetypeQuery::chunks`] and write them with
//! [`EntityStore::set_component`].
//!
//! ## Example
//! ```ignore
//! let mut query = store.query::<(Position, Velocity)>().without_any_tags::<(Frozen,)>();
//! for chunk in query.chunks(&store) {
//!     let (positions, velocities) = chunk.components;
//!     // ...
//! }
//! query.for_each(|_, (positions, velocities)| {
//!     for (p, v) in positions.iter_mut().zip(velocities.iter()) { p.0 += v.0; }
//! }).run_parallel(&mut store);
//! ```

use std::any::type_name;
use std::marker::PhantomData;
use std::ops::Range;
use std::sync::Arc;

use crate::engine::archetype::Archetype;
use crate::engine::component::{lcm, Component, IndexKind, Schema, TypeList};
use crate::engine::parallel::QueryJob;
use crate::engine::pool::BufferPool;
use crate::engine::storage::{ChunksMut, Column, ErasedColumn};
use crate::engine::store::EntityStore;
use crate::engine::types::{ArchetypeId, ArchetypeKey, ComponentId, ComponentTypes, EntityId, Tags, TypeSet};

/// Tuple of one to five component types accessed by a query.
///
/// ## Panics
/// Resolving a set that names an unregistered type or the same type twice
/// panics.
pub trait ComponentSet: 'static {
    /// Shared chunk slices, one per member.
    type Slices<'a>: Send;
    /// Mutable chunk slices, one per member.
    type SlicesMut<'a>: Send;
    /// Lockstep chunk iterators over one archetype's member columns.
    type ChunksMut<'a>: Send;

    /// Component ids of the members, in tuple order.
    fn component_ids(schema: &Schema) -> Vec<ComponentId>;

    /// Shared slices of chunk `chunk`.
    fn slices<'a>(archetype: &'a Archetype, ids: &[ComponentId], chunk: usize) -> Self::Slices<'a>;

    /// Takes the member columns, borrowed in tuple order, as chunk iterators.
    fn chunks_mut<'a>(columns: &mut [Option<&'a mut dyn ErasedColumn>]) -> Self::ChunksMut<'a>;

    /// Mutable slices of the next chunk, or `None` past the last one.
    fn next_chunk<'a>(chunks: &mut Self::ChunksMut<'a>) -> Option<Self::SlicesMut<'a>>;

    /// Splits every member slice at `mid`.
    fn split_at_mut<'a>(slices: Self::SlicesMut<'a>, mid: usize) -> (Self::SlicesMut<'a>, Self::SlicesMut<'a>);
}

fn resolve<T: 'static>(schema: &Schema) -> ComponentId {
    schema
        .component_id::<T>()
        .unwrap_or_else(|| panic!("query component `{}` is not registered", type_name::<T>()))
}

fn column_chunk<'a, T: 'static>(archetype: &'a Archetype, id: ComponentId, chunk: usize) -> &'a [T] {
    archetype
        .column::<T>(id)
        .unwrap_or_else(|| panic!("matched archetype has no `{}` column", type_name::<T>()))
        .chunk(chunk)
}

fn column_chunks_mut<'a, T: 'static>(column: Option<&'a mut dyn ErasedColumn>) -> ChunksMut<'a, T> {
    column
        .and_then(|column| column.as_any_mut().downcast_mut::<Column<T>>())
        .unwrap_or_else(|| panic!("matched archetype has no `{}` column", type_name::<T>()))
        .chunks_mut()
}

macro_rules! impl_component_set {
    ($(($T:ident, $v:ident, $i:tt)),+) => {
        impl<$($T: Component),+> ComponentSet for ($($T,)+) {
            type Slices<'a> = ($(&'a [$T],)+);
            type SlicesMut<'a> = ($(&'a mut [$T],)+);
            type ChunksMut<'a> = ($(ChunksMut<'a, $T>,)+);

            fn component_ids(schema: &Schema) -> Vec<ComponentId> {
                let ids = vec![$(resolve::<$T>(schema)),+];
                for (position, id) in ids.iter().enumerate() {
                    assert!(
                        !ids[..position].contains(id),
                        "query names component `{}` twice",
                        schema.component(*id).name
                    );
                }
                ids
            }

            fn slices<'a>(archetype: &'a Archetype, ids: &[ComponentId], chunk: usize) -> Self::Slices<'a> {
                ($(column_chunk::<$T>(archetype, ids[$i], chunk),)+)
            }

            fn chunks_mut<'a>(columns: &mut [Option<&'a mut dyn ErasedColumn>]) -> Self::ChunksMut<'a> {
                ($(column_chunks_mut::<$T>(columns.get_mut($i).and_then(Option::take)),)+)
            }

            fn next_chunk<'a>(chunks: &mut Self::ChunksMut<'a>) -> Option<Self::SlicesMut<'a>> {
                let ($($v,)+) = chunks;
                Some(($($v.next()?,)+))
            }

            fn split_at_mut<'a>(slices: Self::SlicesMut<'a>, mid: usize) -> (Self::SlicesMut<'a>, Self::SlicesMut<'a>) {
                let ($($v,)+) = slices;
                $(let $v = $v.split_at_mut(mid);)+
                (($($v.0,)+), ($($v.1,)+))
            }
        }
    };
}

impl_component_set!((A, a, 0));
impl_component_set!((A, a, 0), (B, b, 1));
impl_component_set!((A, a, 0), (B, b, 1), (C, c, 2));
impl_component_set!((A, a, 0), (B, b, 1), (C, c, 2), (D, d, 3));
impl_component_set!((A, a, 0), (B, b, 1), (C, c, 2), (D, d, 3), (E, e, 4));

/// Archetype filter of a query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QuerySignature {
    /// Components of the query tuple plus `all_components` refinements.
    pub required: ComponentTypes,
    pub any_components: ComponentTypes,
    pub without_all_components: ComponentTypes,
    pub without_any_components: ComponentTypes,
    pub all_tags: Tags,
    pub any_tags: Tags,
    pub without_all_tags: Tags,
    pub without_any_tags: Tags,
}

impl QuerySignature {
    /// Returns `true` if an archetype with `key` is selected.
    pub fn matches(&self, key: &ArchetypeKey) -> bool {
        fn check(set: &TypeSet, all: &TypeSet, any: &TypeSet, without_all: &TypeSet, without_any: &TypeSet) -> bool {
            set.contains_all(all)
                && (any.is_empty() || set.intersects(any))
                && (without_all.is_empty() || !set.contains_all(without_all))
                && !set.intersects(without_any)
        }
        check(
            key.components(),
            &self.required,
            &self.any_components,
            &self.without_all_components,
            &self.without_any_components,
        ) && check(
            key.tags(),
            &self.all_tags,
            &self.any_tags,
            &self.without_all_tags,
            &self.without_any_tags,
        )
    }
}

/// A query over component tuple `Q` with a cached archetype match list.
pub struct ArchetypeQuery<Q: ComponentSet> {
    schema: Arc<Schema>,
    signature: QuerySignature,
    component_ids: Vec<ComponentId>,
    multiple: usize,
    matched: Vec<ArchetypeId>,
    checked: usize,
    pub(crate) sections: BufferPool<Range<usize>>,
    _marker: PhantomData<fn() -> Q>,
}

impl<Q: ComponentSet> std::fmt::Debug for ArchetypeQuery<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchetypeQuery")
            .field("components", &self.component_ids)
            .field("signature", &self.signature)
            .field("matched", &self.matched)
            .finish()
    }
}

impl<Q: ComponentSet> ArchetypeQuery<Q> {
    /// Builds a query against `schema`.
    ///
    /// ## Panics
    /// Panics if `Q` names an unregistered type or the same type twice.
    pub fn new(schema: Arc<Schema>) -> Self {
        let component_ids = Q::component_ids(&schema);
        let multiple = component_ids
            .iter()
            .map(|id| schema.component(*id).alignment_multiple)
            .fold(1, lcm);
        let signature = QuerySignature {
            required: TypeSet::from_ids(&component_ids),
            ..QuerySignature::default()
        };
        Self {
            schema,
            signature,
            component_ids,
            multiple,
            matched: Vec::new(),
            checked: 0,
            sections: BufferPool::new(),
            _marker: PhantomData,
        }
    }

    /// Current filter.
    pub fn signature(&self) -> &QuerySignature {
        &self.signature
    }

    /// Component ids of `Q`, in tuple order.
    pub fn component_ids(&self) -> &[ComponentId] {
        &self.component_ids
    }

    /// Least common multiple of the alignment multiples of `Q`'s members.
    pub fn multiple(&self) -> usize {
        self.multiple
    }

    fn refine(mut self, edit: impl FnOnce(&mut QuerySignature)) -> Self {
        edit(&mut self.signature);
        self.matched.clear();
        self.checked = 0;
        self
    }

    fn tags_of<L: TypeList>(&self) -> Tags {
        self.schema
            .tag_set::<L>()
            .unwrap_or_else(|error| panic!("query refinement: {error}"))
    }

    fn components_of<L: TypeList>(&self) -> ComponentTypes {
        self.schema
            .component_set::<L>()
            .unwrap_or_else(|error| panic!("query refinement: {error}"))
    }

    /// Requires every tag of `L`.
    #[must_use]
    pub fn all_tags<L: TypeList>(self) -> Self {
        let tags = self.tags_of::<L>();
        self.refine(|s| s.all_tags = s.all_tags.union(&tags))
    }

    /// Requires at least one tag of `L`.
    #[must_use]
    pub fn any_tags<L: TypeList>(self) -> Self {
        let tags = self.tags_of::<L>();
        self.refine(|s| s.any_tags = s.any_tags.union(&tags))
    }

    /// Rejects archetypes carrying every tag of `L`.
    #[must_use]
    pub fn without_all_tags<L: TypeList>(self) -> Self {
        let tags = self.tags_of::<L>();
        self.refine(|s| s.without_all_tags = s.without_all_tags.union(&tags))
    }

    /// Rejects archetypes carrying any tag of `L`.
    #[must_use]
    pub fn without_any_tags<L: TypeList>(self) -> Self {
        let tags = self.tags_of::<L>();
        self.refine(|s| s.without_any_tags = s.without_any_tags.union(&tags))
    }

    /// Requires every component of `L` in addition to `Q`.
    #[must_use]
    pub fn all_components<L: TypeList>(self) -> Self {
        let components = self.components_of::<L>();
        self.refine(|s| s.required = s.required.union(&components))
    }

    /// Requires at least one component of `L`.
    #[must_use]
    pub fn any_components<L: TypeList>(self) -> Self {
        let components = self.components_of::<L>();
        self.refine(|s| s.any_components = s.any_components.union(&components))
    }

    /// Rejects archetypes storing every component of `L`.
    #[must_use]
    pub fn without_all_components<L: TypeList>(self) -> Self {
        let components = self.components_of::<L>();
        self.refine(|s| s.without_all_components = s.without_all_components.union(&components))
    }

    /// Rejects archetypes storing any component of `L`.
    #[must_use]
    pub fn without_any_components<L: TypeList>(self) -> Self {
        let components = self.components_of::<L>();
        self.refine(|s| s.without_any_components = s.without_any_components.union(&components))
    }

    /// Tests archetypes created since the last refresh.
    ///
    /// ## Panics
    /// Panics if `store` was built from a different schema.
    pub fn refresh(&mut self, store: &EntityStore) -> &[ArchetypeId] {
        assert!(
            Arc::ptr_eq(&self.schema, store.schema()),
            "query used with a store built from another schema"
        );
        let archetypes = store.archetypes();
        for archetype in &archetypes[self.checked..] {
            if self.signature.matches(archetype.key()) {
                self.matched.push(archetype.id());
            }
        }
        self.checked = archetypes.len();
        &self.matched
    }

    /// Matching archetypes, in creation order.
    pub fn archetypes(&mut self, store: &EntityStore) -> Vec<ArchetypeId> {
        self.refresh(store).to_vec()
    }

    /// Number of entities in matching archetypes.
    pub fn entity_count(&mut self, store: &EntityStore) -> usize {
        self.refresh(store)
            .iter()
            .map(|id| store.archetypes()[*id as usize].len())
            .sum()
    }

    /// Ids of the matched entities, in enumeration order.
    pub fn entities(&mut self, store: &EntityStore) -> Vec<EntityId> {
        let mut out = Vec::with_capacity(self.entity_count(store));
        for id in &self.matched {
            out.extend_from_slice(store.archetypes()[*id as usize].entity_ids());
        }
        out
    }

    /// Lazy read-only chunk enumeration.
    pub fn chunks<'a>(&'a mut self, store: &'a EntityStore) -> QueryChunks<'a, Q> {
        self.refresh(store);
        QueryChunks {
            archetypes: store.archetypes(),
            matched: &self.matched,
            component_ids: &self.component_ids,
            position: 0,
            chunk: 0,
            _marker: PhantomData,
        }
    }

    /// Wraps `action` into a job run sequentially or in parallel.
    ///
    /// `action` receives the entity ids of one chunk section and the mutable
    /// component slices of the same rows.
    ///
    /// ## Panics
    /// Panics if `Q` names an indexed component. Indexed values are written
    /// through [`EntityStore::set_component`] so their index sees the change.
    pub fn for_each<F>(&mut self, action: F) -> QueryJob<'_, Q, F>
    where
        F: for<'a> FnMut(&'a [EntityId], Q::SlicesMut<'a>),
    {
        let schema = &self.schema;
        if let Some(id) = self
            .component_ids
            .iter()
            .find(|id| schema.component(**id).index != IndexKind::None)
        {
            panic!("query action cannot write indexed component `{}`", schema.component(*id).name);
        }
        QueryJob::new(self, action)
    }

    /// Section buffers held for reuse by the next parallel run.
    pub fn pooled_buffers(&self) -> usize {
        self.sections.pooled()
    }

    pub(crate) fn matched(&self) -> &[ArchetypeId] {
        &self.matched
    }
}

/// One chunk of a matching archetype.
pub struct QueryChunk<'a, Q: ComponentSet> {
    /// Archetype the chunk belongs to.
    pub archetype: ArchetypeId,
    /// Entity ids by row.
    pub entities: &'a [EntityId],
    /// Component slices, in tuple order; all as long as `entities`.
    pub components: Q::Slices<'a>,
}

impl<'a, Q: ComponentSet> QueryChunk<'a, Q> {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Iterator over the chunks of a query. See [`ArchetypeQuery::chunks`].
pub struct QueryChunks<'a, Q: ComponentSet> {
    archetypes: &'a [Archetype],
    matched: &'a [ArchetypeId],
    component_ids: &'a [ComponentId],
    position: usize,
    chunk: usize,
    _marker: PhantomData<fn() -> Q>,
}

impl<'a, Q: ComponentSet> Iterator for QueryChunks<'a, Q> {
    type Item = QueryChunk<'a, Q>;

    fn next(&mut self) -> Option<Self::Item> {
        let archetypes = self.archetypes;
        let component_ids = self.component_ids;
        loop {
            let archetype = &archetypes[*self.matched.get(self.position)? as usize];
            if self.chunk >= archetype.chunk_count() {
                self.position += 1;
                self.chunk = 0;
                continue;
            }
            let chunk = self.chunk;
            self.chunk += 1;
            return Some(QueryChunk {
                archetype: archetype.id(),
                entities: archetype.entity_chunk(chunk),
                components: Q::slices(archetype, component_ids, chunk),
            });
        }
    }
}
