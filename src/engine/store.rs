//! # Entity store
//!
//! [`EntityStore`] owns every archetype, the entity slot table, the component
//! indexes and the event recorder of one world, and is the only way to change
//! any of them.
//!
//! ## Structural changes
//! Adding or removing a component or tag moves the entity into the archetype
//! implied by its new signature. That archetype is found through the
//! interning map keyed by [`ArchetypeKey`], or created once on a miss. The
//! move is a column-wise row transfer followed by a swap-remove in the source,
//! after which the row of the entity that filled the hole is fixed up.
//!
//! ## Index maintenance
//! Index hooks run synchronously with the write that changes an indexed
//! value, and always see the previous value read before the overwrite.
//! Indexed components cannot be borrowed mutably, by
//! [`EntityStore::get_component_mut`] or by a query action; write them with
//! [`EntityStore::set_component`]. A link may only point at a live entity.
//!
//! ## Threading
//! Every mutation takes `&mut self`. The only concurrent access is
//! [`QueryJob::run_parallel`](crate::engine::parallel::QueryJob::run_parallel),
//! which itself borrows the store exclusively.

use std::any::{type_name, Any};
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use crate::engine::archetype::{archetype_pair_mut, Archetype};
use crate::engine::component::{Component, IndexKind, IndexedComponent, LinkComponent, Schema};
use crate::engine::config::StoreConfig;
use crate::engine::entity::{EntityLocation, EntityNode, EntityNodes};
use crate::engine::error::{ECSError, ECSResult};
use crate::engine::events::{EventAction, EventKind, EventRecorder};
use crate::engine::index::{ComponentValueIndex, EntityIndex, EntityLinkIndex, ErasedIndex, ValueIndex};
use crate::engine::query::{ArchetypeQuery, ComponentSet};
use crate::engine::types::{
    ArchetypeId, ArchetypeKey, ComponentId, EntityId, TagId, Tags, TypeSet,
};

/// Id of the archetype with no components and no tags.
pub const EMPTY_ARCHETYPE: ArchetypeId = 0;

/// In-memory columnar entity store.
pub struct EntityStore {
    schema: Arc<Schema>,
    config: StoreConfig,
    archetypes: Vec<Archetype>,
    archetype_ids: FxHashMap<ArchetypeKey, ArchetypeId>,
    nodes: EntityNodes,
    indexes: Vec<Option<Box<dyn ErasedIndex>>>,
    events: EventRecorder,
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("entities", &self.nodes.live_count())
            .field("archetypes", &self.archetypes.len())
            .field("config", &self.config)
            .finish()
    }
}

impl EntityStore {
    /// Creates a store with default configuration.
    pub fn new(schema: Arc<Schema>) -> Self {
        Self::with_config(schema, StoreConfig::default())
    }

    /// Creates a store.
    pub fn with_config(schema: Arc<Schema>, config: StoreConfig) -> Self {
        let indexes = schema
            .components()
            .iter()
            .map(|info| {
                info.index_factory()
                    .map(|factory| factory(info.index_bit.unwrap_or_default()))
            })
            .collect();

        let empty = ArchetypeKey::empty();
        let mut archetype_ids = FxHashMap::default();
        archetype_ids.insert(empty, EMPTY_ARCHETYPE);

        Self {
            archetypes: vec![Archetype::new(EMPTY_ARCHETYPE, empty, &schema)],
            archetype_ids,
            nodes: EntityNodes::with_capacity(config.initial_entity_capacity),
            indexes,
            events: EventRecorder::new(config.record_events),
            schema,
            config,
        }
    }

    #[inline]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[inline]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// All archetypes, indexed by [`ArchetypeId`], in creation order.
    #[inline]
    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    #[inline]
    pub(crate) fn archetypes_mut(&mut self) -> &mut [Archetype] {
        &mut self.archetypes
    }

    pub fn archetype(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id as usize)
    }

    // ----- archetypes -----

    /// Interned archetype for `key`, without creating one.
    pub fn try_get_archetype(&self, key: &ArchetypeKey) -> Option<ArchetypeId> {
        self.archetype_ids.get(key).copied()
    }

    /// Interned archetype for `key`, created on first use.
    ///
    /// ## Panics
    /// Panics if `key` names a component or tag id the schema does not know.
    pub fn get_or_create_archetype(&mut self, key: ArchetypeKey) -> ArchetypeId {
        if let Some(id) = self.archetype_ids.get(&key) {
            return *id;
        }
        assert!(
            key.tags().iter().all(|tag| (tag as usize) < self.schema.tags().len()),
            "archetype key names an unknown tag id"
        );
        let id = self.archetypes.len() as ArchetypeId;
        self.archetypes.push(Archetype::new(id, key, &self.schema));
        self.archetype_ids.insert(key, id);
        debug!(
            archetype = id,
            components = key.components().count(),
            tags = key.tags().count(),
            "interned archetype"
        );
        id
    }

    // ----- entities -----

    /// Creates an entity in the empty archetype.
    pub fn create_entity(&mut self) -> EntityId {
        let row = self.archetypes[EMPTY_ARCHETYPE as usize].len();
        let id = self.nodes.spawn(EMPTY_ARCHETYPE, row);
        self.archetypes[EMPTY_ARCHETYPE as usize].add_entity(id);
        id
    }

    /// Creates an entity with default-initialized components in `archetype`.
    ///
    /// ## Errors
    /// [`ECSError::UnknownArchetype`] if the archetype does not exist.
    pub fn create_entity_in(&mut self, archetype: ArchetypeId) -> ECSResult<EntityId> {
        let target = self
            .archetypes
            .get_mut(archetype as usize)
            .ok_or(ECSError::UnknownArchetype(archetype))?;
        let row = target.len();
        let id = self.nodes.spawn(archetype, row);
        target.add_entity(id);

        let key = *target.key();
        for component in key.components().iter() {
            self.index_add(component, id, archetype, row);
            self.events.record(EventKind::Component, EventAction::Added, id, component);
        }
        for tag in key.tags().iter() {
            self.events.record(EventKind::Tag, EventAction::Added, id, tag);
        }
        Ok(id)
    }

    /// Deletes an entity, its index entries and every link pointing at it.
    ///
    /// ## Errors
    /// [`ECSError::StaleEntity`] if `id` is not alive.
    pub fn delete_entity(&mut self, id: EntityId) -> ECSResult<()> {
        let linked = self.node(id)?.is_linked;
        if linked != 0 {
            self.unlink_referencing(id, linked)?;
        }

        let node = *self.node(id)?;
        let archetype = node.archetype;
        let row = node.row as usize;
        let key = *self.archetypes[archetype as usize].key();
        for component in key.components().iter() {
            self.index_remove(component, id, archetype, row);
            self.events.record(EventKind::Component, EventAction::Removed, id, component);
        }
        for tag in key.tags().iter() {
            self.events.record(EventKind::Tag, EventAction::Removed, id, tag);
        }

        if let Some(moved) = self.archetypes[archetype as usize].remove_entity(row) {
            self.nodes.set_row(moved, row);
        }
        self.nodes.despawn(id);
        trace!(entity = id, archetype, "deleted entity");
        Ok(())
    }

    /// Removes the link component from every entity whose link of an indexed
    /// type in `mask` points at `target`.
    fn unlink_referencing(&mut self, target: EntityId, mask: u32) -> ECSResult<()> {
        let schema = Arc::clone(&self.schema);
        for info in schema.components() {
            let Some(bit) = info.index_bit else { continue };
            if info.index != IndexKind::EntityLink || mask & (1 << bit) == 0 {
                continue;
            }
            let owners = self.indexes[info.id as usize]
                .as_ref()
                .map(|index| index.referencing_entities(target))
                .unwrap_or_default();
            for owner in owners {
                self.remove_component_by_id(owner, info.id)?;
            }
        }
        Ok(())
    }

    #[inline]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.nodes.is_alive(id)
    }

    /// Number of live entities.
    #[inline]
    pub fn entity_count(&self) -> usize {
        self.nodes.live_count()
    }

    /// Archetype and row of a live entity.
    pub fn entity_location(&self, id: EntityId) -> Option<EntityLocation> {
        self.nodes.location(id)
    }

    /// Location and link masks of a live entity.
    pub fn entity_node(&self, id: EntityId) -> Option<&EntityNode> {
        self.nodes.get(id)
    }

    fn node(&self, id: EntityId) -> ECSResult<&EntityNode> {
        self.nodes.get(id).ok_or(ECSError::StaleEntity(id))
    }

    // ----- components -----

    /// Attaches `value`, or overwrites the existing value.
    pub fn add_component<T: Component>(
        &mut self,
        id: EntityId,
        value: T,
    ) -> ECSResult<()> {
        self.set_component(id, value).map(|_| ())
    }

    /// Attaches or overwrites a component. Returns the previous value when
    /// the entity already held one.
    ///
    /// ## Errors
    /// Fails for unregistered types and dead entities. A link component whose
    /// target is not alive fails with [`ECSError::StaleEntity`] for the
    /// target, and the store is left unchanged.
    pub fn set_component<T: Component>(
        &mut self,
        id: EntityId,
        value: T,
    ) -> ECSResult<Option<T>> {
        let component = self.schema.require_component::<T>()?;
        let node = *self.node(id)?;
        self.check_link_target(component, &value)?;
        let source = node.archetype;
        let row = node.row as usize;

        if self.archetypes[source as usize].has_component(component) {
            let Self { archetypes, indexes, nodes, .. } = self;
            let column = archetypes[source as usize]
                .column_mut::<T>(component)
                .ok_or(ECSError::MissingComponent { entity: id, name: type_name::<T>() })?;
            let slot = column.get_mut(row).ok_or(ECSError::StaleEntity(id))?;
            let old = std::mem::replace(slot, value);
            if let Some(index) = indexes[component as usize].as_mut() {
                index.on_update(id, &old, &*slot, nodes);
            }
            return Ok(Some(old));
        }

        let key = self.archetypes[source as usize].key().with_component(component);
        let target = self.get_or_create_archetype(key);
        let row = self.migrate(id, target);
        if let Some(slot) = self.archetypes[target as usize]
            .column_mut::<T>(component)
            .and_then(|column| column.get_mut(row))
        {
            *slot = value;
        }
        self.index_add(component, id, target, row);
        self.events.record(EventKind::Component, EventAction::Added, id, component);
        Ok(None)
    }

    /// Detaches a component and returns its value, or `None` if the entity
    /// did not hold one.
    pub fn remove_component<T: Component>(
        &mut self,
        id: EntityId,
    ) -> ECSResult<Option<T>> {
        let component = self.schema.require_component::<T>()?;
        let node = *self.node(id)?;
        let source = node.archetype;
        let row = node.row as usize;
        if !self.archetypes[source as usize].has_component(component) {
            return Ok(None);
        }

        let value = {
            let Self { archetypes, indexes, nodes, .. } = self;
            let slot = archetypes[source as usize]
                .column_mut::<T>(component)
                .and_then(|column| column.get_mut(row))
                .ok_or(ECSError::MissingComponent { entity: id, name: type_name::<T>() })?;
            let value = std::mem::take(slot);
            if let Some(index) = indexes[component as usize].as_mut() {
                index.on_remove(id, &value, nodes);
            }
            value
        };

        let key = self.archetypes[source as usize].key().without_component(component);
        let target = self.get_or_create_archetype(key);
        self.migrate(id, target);
        self.events.record(EventKind::Component, EventAction::Removed, id, component);
        Ok(Some(value))
    }

    /// Type-erased [`remove_component`](Self::remove_component). Returns
    /// whether a component was removed.
    pub fn remove_component_by_id(&mut self, id: EntityId, component: ComponentId) -> ECSResult<bool> {
        self.check_component(component)?;
        let node = *self.node(id)?;
        let source = node.archetype;
        if !self.archetypes[source as usize].has_component(component) {
            return Ok(false);
        }
        self.index_remove(component, id, source, node.row as usize);
        let key = self.archetypes[source as usize].key().without_component(component);
        let target = self.get_or_create_archetype(key);
        self.migrate(id, target);
        self.events.record(EventKind::Component, EventAction::Removed, id, component);
        Ok(true)
    }

    /// Shared borrow of a component.
    pub fn get_component<T: 'static>(&self, id: EntityId) -> ECSResult<Option<&T>> {
        let component = self.schema.require_component::<T>()?;
        let node = self.node(id)?;
        Ok(self.archetypes[node.archetype as usize]
            .column::<T>(component)
            .and_then(|column| column.get(node.row as usize)))
    }

    /// Mutable borrow of a non-indexed component.
    ///
    /// ## Errors
    /// [`ECSError::IndexedMutation`] for indexed types.
    pub fn get_component_mut<T: 'static>(&mut self, id: EntityId) -> ECSResult<Option<&mut T>> {
        let component = self.schema.require_component::<T>()?;
        if self.schema.component(component).index != IndexKind::None {
            return Err(ECSError::IndexedMutation { name: type_name::<T>() });
        }
        let node = *self.node(id)?;
        Ok(self.archetypes[node.archetype as usize]
            .column_mut::<T>(component)
            .and_then(|column| column.get_mut(node.row as usize)))
    }

    /// Returns `true` if `id` is alive and holds component `T`.
    pub fn has_component<T: 'static>(&self, id: EntityId) -> bool {
        self.schema
            .component_id::<T>()
            .map_or(false, |component| self.has_component_id(id, component))
    }

    /// Returns `true` if `id` is alive and holds component `component`.
    pub fn has_component_id(&self, id: EntityId, component: ComponentId) -> bool {
        self.nodes
            .get(id)
            .map_or(false, |node| self.archetypes[node.archetype as usize].has_component(component))
    }

    // ----- tags -----

    /// Adds tag `T`. Returns `false` if the entity already carried it.
    pub fn add_tag<T: 'static>(&mut self, id: EntityId) -> ECSResult<bool> {
        let tag = self.schema.require_tag::<T>()?;
        self.add_tags(id, TypeSet::EMPTY.with(tag))
    }

    /// Removes tag `T`. Returns `false` if the entity did not carry it.
    pub fn remove_tag<T: 'static>(&mut self, id: EntityId) -> ECSResult<bool> {
        let tag = self.schema.require_tag::<T>()?;
        self.remove_tags(id, TypeSet::EMPTY.with(tag))
    }

    /// Returns `true` if `id` is alive and carries tag `T`.
    pub fn has_tag<T: 'static>(&self, id: EntityId) -> bool {
        self.schema
            .tag_id::<T>()
            .map_or(false, |tag| self.has_tag_id(id, tag))
    }

    /// Returns `true` if `id` is alive and carries tag `tag`.
    pub fn has_tag_id(&self, id: EntityId, tag: TagId) -> bool {
        self.nodes
            .get(id)
            .map_or(false, |node| self.archetypes[node.archetype as usize].has_tag(tag))
    }

    /// Adds every tag of `tags` in one move. Returns `false` if nothing changed.
    pub fn add_tags(&mut self, id: EntityId, tags: Tags) -> ECSResult<bool> {
        let source = self.node(id)?.archetype;
        let key = *self.archetypes[source as usize].key();
        let added = tags.difference(key.tags());
        if added.is_empty() {
            return Ok(false);
        }
        let target = self.get_or_create_archetype(key.with_tags(key.tags().union(&added)));
        self.migrate(id, target);
        for tag in added.iter() {
            self.events.record(EventKind::Tag, EventAction::Added, id, tag);
        }
        Ok(true)
    }

    /// Removes every tag of `tags` in one move. Returns `false` if nothing changed.
    pub fn remove_tags(&mut self, id: EntityId, tags: Tags) -> ECSResult<bool> {
        let source = self.node(id)?.archetype;
        let key = *self.archetypes[source as usize].key();
        let removed = key.tags().intersection(&tags);
        if removed.is_empty() {
            return Ok(false);
        }
        let target = self.get_or_create_archetype(key.with_tags(key.tags().difference(&removed)));
        self.migrate(id, target);
        for tag in removed.iter() {
            self.events.record(EventKind::Tag, EventAction::Removed, id, tag);
        }
        Ok(true)
    }

    // ----- raw access -----

    /// Moves an entity into an existing archetype. Components new to the
    /// target are default-initialized, components absent from it are dropped.
    /// Returns the entity's new row.
    pub fn move_entity_to(&mut self, id: EntityId, archetype: ArchetypeId) -> ECSResult<usize> {
        if archetype as usize >= self.archetypes.len() {
            return Err(ECSError::UnknownArchetype(archetype));
        }
        let node = *self.node(id)?;
        let source = node.archetype;
        if source == archetype {
            return Ok(node.row as usize);
        }
        let source_key = *self.archetypes[source as usize].key();
        let target_key = *self.archetypes[archetype as usize].key();
        let dropped = source_key.components().difference(target_key.components());
        let created = target_key.components().difference(source_key.components());

        for component in dropped.iter() {
            self.index_remove(component, id, source, node.row as usize);
        }
        let row = self.migrate(id, archetype);
        for component in created.iter() {
            self.index_add(component, id, archetype, row);
        }

        for component in dropped.iter() {
            self.events.record(EventKind::Component, EventAction::Removed, id, component);
        }
        for component in created.iter() {
            self.events.record(EventKind::Component, EventAction::Added, id, component);
        }
        for tag in source_key.tags().difference(target_key.tags()).iter() {
            self.events.record(EventKind::Tag, EventAction::Removed, id, tag);
        }
        for tag in target_key.tags().difference(source_key.tags()).iter() {
            self.events.record(EventKind::Tag, EventAction::Added, id, tag);
        }
        Ok(row)
    }

    /// Cloned value of a component, type-erased.
    pub fn read_component_raw(&self, id: EntityId, component: ComponentId) -> ECSResult<Box<dyn Any + Send>> {
        let name = self.check_component(component)?;
        let node = self.node(id)?;
        let column = self.archetypes[node.archetype as usize]
            .erased_column(component)
            .ok_or(ECSError::MissingComponent { entity: id, name })?;
        Ok(column.read_value(node.row as usize)?)
    }

    /// Overwrites a component from a type-erased value, keeping its index
    /// consistent.
    ///
    /// ## Errors
    /// [`ColumnError::TypeMismatch`](crate::engine::error::ColumnError) if
    /// `value` is not of the component's type, [`ECSError::StaleEntity`] if it
    /// links to a dead entity. The store is left unchanged on error.
    pub fn write_component_raw(
        &mut self,
        id: EntityId,
        component: ComponentId,
        value: Box<dyn Any + Send>,
    ) -> ECSResult<()> {
        let name = self.check_component(component)?;
        let node = *self.node(id)?;
        self.check_link_target(component, &*value)?;
        let row = node.row as usize;
        let Self { archetypes, indexes, nodes, .. } = self;
        let column = archetypes[node.archetype as usize]
            .erased_column_mut(component)
            .ok_or(ECSError::MissingComponent { entity: id, name })?;

        match indexes[component as usize].as_mut() {
            Some(index) => {
                let old = column.read_value(row)?;
                column.write_value(row, value)?;
                if let Some(new) = column.value_any(row) {
                    index.on_update(id, &*old, new, nodes);
                }
            }
            None => column.write_value(row, value)?,
        }
        Ok(())
    }

    /// Fails if `value` is a link to an entity that is not alive.
    fn check_link_target(&self, component: ComponentId, value: &dyn Any) -> ECSResult<()> {
        let target = self.indexes[component as usize]
            .as_ref()
            .and_then(|index| index.link_target(value));
        match target {
            Some(target) if !self.nodes.is_alive(target) => Err(ECSError::StaleEntity(target)),
            _ => Ok(()),
        }
    }

    fn check_component(&self, component: ComponentId) -> ECSResult<&'static str> {
        self.schema
            .components()
            .get(component as usize)
            .map(|info| info.name)
            .ok_or(ECSError::UnknownComponent(component))
    }

    // ----- indexes -----

    /// Value index of component `T`.
    ///
    /// ## Panics
    /// Panics if `T` was not registered with
    /// [`indexed_component`](crate::engine::component::SchemaBuilder::indexed_component).
    pub fn value_index<T: IndexedComponent>(&self) -> &ValueIndex<T::Value> {
        self.schema
            .component_id::<T>()
            .and_then(|component| self.indexes[component as usize].as_ref())
            .and_then(|index| index.as_any().downcast_ref::<ComponentValueIndex<T>>())
            .map(|index| &index.index)
            .unwrap_or_else(|| panic!("component `{}` has no value index", type_name::<T>()))
    }

    fn value_index_mut<T: IndexedComponent>(&mut self) -> &mut ValueIndex<T::Value> {
        self.schema
            .component_id::<T>()
            .and_then(|component| self.indexes[component as usize].as_mut())
            .and_then(|index| index.as_any_mut().downcast_mut::<ComponentValueIndex<T>>())
            .map(|index| &mut index.index)
            .unwrap_or_else(|| panic!("component `{}` has no value index", type_name::<T>()))
    }

    /// Entity index of link component `T`.
    ///
    /// ## Panics
    /// Panics if `T` was not registered with
    /// [`linked_component`](crate::engine::component::SchemaBuilder::linked_component).
    pub fn entity_index<T: LinkComponent>(&self) -> &EntityIndex {
        self.schema
            .component_id::<T>()
            .and_then(|component| self.indexes[component as usize].as_ref())
            .and_then(|index| index.as_any().downcast_ref::<EntityLinkIndex<T>>())
            .map(|index| &index.index)
            .unwrap_or_else(|| panic!("component `{}` has no entity index", type_name::<T>()))
    }

    /// Entities whose `T` component currently indexes as `value`.
    pub fn lookup_entities<T: IndexedComponent>(&self, value: &T::Value) -> &[EntityId] {
        self.value_index::<T>().lookup(value)
    }

    /// Entities whose `T` component indexes within `[min, max]`.
    pub fn lookup_range<T: IndexedComponent>(&mut self, min: &T::Value, max: &T::Value) -> FxHashSet<EntityId>
    where
        T::Value: Ord,
    {
        self.value_index_mut::<T>().lookup_range(min, max)
    }

    /// Distinct values of `T` currently indexed.
    pub fn indexed_values<T: IndexedComponent>(&self) -> Vec<T::Value> {
        self.value_index::<T>().keys().cloned().collect()
    }

    /// Entities whose `T` link points at `target`.
    pub fn linked_entities<T: LinkComponent>(&self, target: EntityId) -> &[EntityId] {
        self.entity_index::<T>().owners_of(target)
    }

    // ----- events -----

    #[inline]
    pub fn events(&self) -> &EventRecorder {
        &self.events
    }

    #[inline]
    pub fn events_mut(&mut self) -> &mut EventRecorder {
        &mut self.events
    }

    /// Starts or stops event recording.
    pub fn set_event_recording(&mut self, enabled: bool) {
        self.events.set_enabled(enabled);
    }

    /// Drops all recorded events.
    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    // ----- queries -----

    /// Query over component tuple `Q`.
    pub fn query<Q: ComponentSet>(&self) -> ArchetypeQuery<Q> {
        ArchetypeQuery::new(Arc::clone(&self.schema))
    }

    // ----- internals -----

    /// Moves `id` into `target` and fixes up both rows. Returns the new row.
    fn migrate(&mut self, id: EntityId, target: ArchetypeId) -> usize {
        let (source, row) = match self.nodes.get(id) {
            Some(node) => (node.archetype, node.row as usize),
            None => panic!("migrate: entity {id} is not alive"),
        };
        if source == target {
            return row;
        }
        let (from, to) = archetype_pair_mut(&mut self.archetypes, source, target);
        let (new_row, moved) = from.move_entity_to(row, to);
        if let Some(moved) = moved {
            self.nodes.set_row(moved, row);
        }
        self.nodes.set_location(id, target, new_row);
        trace!(entity = id, from = source, to = target, row = new_row, "migrated entity");
        new_row
    }

    fn index_add(&mut self, component: ComponentId, id: EntityId, archetype: ArchetypeId, row: usize) {
        let Self { archetypes, indexes, nodes, .. } = self;
        let Some(index) = indexes[component as usize].as_mut() else { return };
        if let Some(value) = archetypes[archetype as usize]
            .erased_column(component)
            .and_then(|column| column.value_any(row))
        {
            index.on_add(id, value, nodes);
        }
    }

    fn index_remove(&mut self, component: ComponentId, id: EntityId, archetype: ArchetypeId, row: usize) {
        let Self { archetypes, indexes, nodes, .. } = self;
        let Some(index) = indexes[component as usize].as_mut() else { return };
        if let Some(value) = archetypes[archetype as usize]
            .erased_column(component)
            .and_then(|column| column.value_any(row))
        {
            index.on_remove(id, value, nodes);
        }
    }
}
