//! # Archetype storage
//!
//! An [`Archetype`] stores every entity that shares one exact
//! [`ArchetypeKey`]: the same component set and the same tag set.
//!
//! ## Layout
//! - One chunked [`Column`](crate::engine::storage::Column) per component
//!   type, in ascending [`ComponentId`] order.
//! - A dense `entity_ids` array mapping row to entity.
//! - Tags have no storage; they only take part in the key.
//!
//! ## Invariants
//! - Every column and `entity_ids` have the same length.
//! - Rows `[0, len)` are populated with no gaps; removal is swap-remove.
//! - The key never changes after creation.
//!
//! ## Structural moves
//! [`Archetype::move_entity_to`] transfers one row into another archetype:
//! shared components are moved column by column, components new to the target
//! are default-initialized and components absent from the target are dropped.
//! The source row is then filled with the source's last row. The caller fixes
//! up the row of the entity reported as moved.

use std::any::type_name;

use crate::engine::component::Schema;
use crate::engine::storage::{Column, ErasedColumn};
use crate::engine::types::{
    ArchetypeId, ArchetypeKey, ComponentId, ComponentTypes, EntityId, Tags, CHUNK_SIZE,
    MAX_COMPONENT_TYPES, MAX_QUERY_COMPONENTS,
};

/// Columnar storage of all entities sharing one component / tag signature.
pub struct Archetype {
    id: ArchetypeId,
    key: ArchetypeKey,
    component_ids: Vec<ComponentId>,
    columns: Vec<Box<dyn ErasedColumn>>,
    column_of: Box<[Option<u16>]>,
    entity_ids: Vec<EntityId>,
}

impl std::fmt::Debug for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archetype")
            .field("id", &self.id)
            .field("components", &self.component_ids)
            .field("tags", &self.key.tags().iter().collect::<Vec<_>>())
            .field("len", &self.entity_ids.len())
            .finish()
    }
}

impl Archetype {
    /// Creates an empty archetype with one column per component in `key`.
    ///
    /// ## Panics
    /// Panics if `key` names a component id the schema does not know.
    pub fn new(id: ArchetypeId, key: ArchetypeKey, schema: &Schema) -> Self {
        let mut column_of = vec![None; MAX_COMPONENT_TYPES].into_boxed_slice();
        let mut component_ids = Vec::with_capacity(key.components().count());
        let mut columns = Vec::with_capacity(key.components().count());

        for component_id in key.components().iter() {
            assert!(
                (component_id as usize) < schema.components().len(),
                "archetype key names unknown component id {component_id}"
            );
            let info = schema.component(component_id);
            column_of[component_id as usize] = Some(columns.len() as u16);
            component_ids.push(component_id);
            columns.push((info.column_factory())());
        }

        Self { id, key, component_ids, columns, column_of, entity_ids: Vec::new() }
    }

    /// Identifier, stable for the store's lifetime.
    #[inline]
    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    /// Interning key.
    #[inline]
    pub fn key(&self) -> &ArchetypeKey {
        &self.key
    }

    #[inline]
    pub fn components(&self) -> &ComponentTypes {
        self.key.components()
    }

    #[inline]
    pub fn tags(&self) -> &Tags {
        self.key.tags()
    }

    /// Component ids of the columns, ascending.
    #[inline]
    pub fn component_ids(&self) -> &[ComponentId] {
        &self.component_ids
    }

    /// Number of entities stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.entity_ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entity_ids.is_empty()
    }

    /// Entity ids by row.
    #[inline]
    pub fn entity_ids(&self) -> &[EntityId] {
        &self.entity_ids
    }

    #[inline]
    pub fn has_component(&self, component_id: ComponentId) -> bool {
        self.key.components().has(component_id)
    }

    #[inline]
    pub fn has_tag(&self, tag_id: u16) -> bool {
        self.key.tags().has(tag_id)
    }

    /// Number of chunks holding at least one row.
    #[inline]
    pub fn chunk_count(&self) -> usize {
        (self.len() + CHUNK_SIZE - 1) / CHUNK_SIZE
    }

    /// Number of valid rows in chunk `chunk`; the last chunk may be partial.
    pub fn chunk_len(&self, chunk: usize) -> usize {
        let start = chunk * CHUNK_SIZE;
        self.len().saturating_sub(start).min(CHUNK_SIZE)
    }

    /// Entity ids of chunk `chunk`.
    pub fn entity_chunk(&self, chunk: usize) -> &[EntityId] {
        let start = (chunk * CHUNK_SIZE).min(self.len());
        let end = (start + CHUNK_SIZE).min(self.len());
        &self.entity_ids[start..end]
    }

    /// Type-erased column of a component.
    #[inline]
    pub fn erased_column(&self, component_id: ComponentId) -> Option<&dyn ErasedColumn> {
        let index = self.column_of.get(component_id as usize).copied().flatten()?;
        Some(self.columns[index as usize].as_ref())
    }

    /// Mutable type-erased column of a component.
    #[inline]
    pub fn erased_column_mut(&mut self, component_id: ComponentId) -> Option<&mut dyn ErasedColumn> {
        let index = self.column_of.get(component_id as usize).copied().flatten()?;
        Some(self.columns[index as usize].as_mut())
    }

    /// Typed column of a component.
    ///
    /// ## Panics
    /// Panics if the column exists but does not store `T`.
    pub fn column<T: 'static>(&self, component_id: ComponentId) -> Option<&Column<T>> {
        self.erased_column(component_id).map(|column| {
            column
                .as_any()
                .downcast_ref::<Column<T>>()
                .unwrap_or_else(|| panic!("column {component_id} does not store `{}`", type_name::<T>()))
        })
    }

    /// Mutable typed column of a component.
    ///
    /// ## Panics
    /// Panics if the column exists but does not store `T`.
    pub fn column_mut<T: 'static>(&mut self, component_id: ComponentId) -> Option<&mut Column<T>> {
        self.erased_column_mut(component_id).map(|column| {
            column
                .as_any_mut()
                .downcast_mut::<Column<T>>()
                .unwrap_or_else(|| panic!("column {component_id} does not store `{}`", type_name::<T>()))
        })
    }

    /// Entity ids together with disjoint mutable borrows of the requested
    /// columns, in the order of `wanted`. Slots past `wanted.len()` are `None`.
    ///
    /// ## Panics
    /// Panics if a requested component is missing, or if more than
    /// [`MAX_QUERY_COMPONENTS`] are requested.
    pub fn split_columns_mut(
        &mut self,
        wanted: &[ComponentId],
    ) -> (&[EntityId], [Option<&mut dyn ErasedColumn>; MAX_QUERY_COMPONENTS]) {
        assert!(wanted.len() <= MAX_QUERY_COMPONENTS, "query accesses more than {MAX_QUERY_COMPONENTS} columns");
        let mut positions = [usize::MAX; MAX_QUERY_COMPONENTS];
        for (position, component_id) in positions.iter_mut().zip(wanted) {
            *position = match self.column_of.get(*component_id as usize).copied().flatten() {
                Some(index) => index as usize,
                None => panic!("archetype {} has no column {component_id}", self.id),
            };
        }

        let mut columns: [Option<&mut dyn ErasedColumn>; MAX_QUERY_COMPONENTS] = std::array::from_fn(|_| None);
        for (index, column) in self.columns.iter_mut().enumerate() {
            if let Some(slot) = positions.iter().position(|position| *position == index) {
                let column: &mut dyn ErasedColumn = column.as_mut();
                columns[slot] = Some(column);
            }
        }
        (&self.entity_ids, columns)
    }

    /// Appends `entity` with default-initialized components. Returns its row.
    pub fn add_entity(&mut self, entity: EntityId) -> usize {
        for column in &mut self.columns {
            column.push_default();
        }
        self.entity_ids.push(entity);
        self.entity_ids.len() - 1
    }

    /// Swap-removes `row`. Returns the entity that now occupies `row`, if any.
    ///
    /// ## Panics
    /// Panics if `row` is out of bounds.
    pub fn remove_entity(&mut self, row: usize) -> Option<EntityId> {
        for column in &mut self.columns {
            column.swap_remove_drop(row);
        }
        self.entity_ids.swap_remove(row);
        self.entity_ids.get(row).copied()
    }

    /// Moves the entity at `row` into `target`.
    ///
    /// Returns the entity's row in `target` and the entity that was swapped
    /// into `row` in this archetype, if any.
    ///
    /// ## Panics
    /// Panics if `row` is out of bounds or `target` is this archetype.
    pub fn move_entity_to(&mut self, row: usize, target: &mut Archetype) -> (usize, Option<EntityId>) {
        assert!(row < self.len(), "row {row} out of bounds in archetype {}", self.id);
        assert_ne!(self.id, target.id, "move_entity_to within one archetype");

        for (component_id, column) in target.component_ids.iter().zip(target.columns.iter_mut()) {
            match self.column_of[*component_id as usize] {
                Some(source) => {
                    column.push_from(self.columns[source as usize].as_mut(), row);
                }
                None => {
                    column.push_default();
                }
            }
        }
        for (component_id, column) in self.component_ids.iter().zip(self.columns.iter_mut()) {
            if !target.has_component(*component_id) {
                column.swap_remove_drop(row);
            }
        }

        let entity = self.entity_ids.swap_remove(row);
        target.entity_ids.push(entity);
        (target.entity_ids.len() - 1, self.entity_ids.get(row).copied())
    }
}

/// Borrows two distinct archetypes mutably.
///
/// ## Panics
/// Panics if `a == b` or either id is out of bounds.
pub fn archetype_pair_mut(
    archetypes: &mut [Archetype],
    a: ArchetypeId,
    b: ArchetypeId,
) -> (&mut Archetype, &mut Archetype) {
    let (a, b) = (a as usize, b as usize);
    assert_ne!(a, b, "archetype_pair_mut on one archetype");
    if a < b {
        let (low, high) = archetypes.split_at_mut(b);
        (&mut low[a], &mut high[0])
    } else {
        let (low, high) = archetypes.split_at_mut(a);
        (&mut high[0], &mut low[b])
    }
}
