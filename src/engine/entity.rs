//! Entity id allocation and per-entity location metadata.
//!
//! Every live entity owns one [`EntityNode`]: the archetype it lives in, its
//! row inside that archetype, and the two index masks maintained by entity
//! link indexes.

use crate::engine::types::{ArchetypeId, EntityId};

/// Number of slots reserved whenever the free list runs dry.
const GROWTH_BATCH: usize = 1024;

/// Location and index metadata of one entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntityNode {
    /// Archetype currently holding the entity.
    pub archetype: ArchetypeId,
    /// Row of the entity inside `archetype`.
    pub row: u32,
    /// Bit `i` is set while the entity holds a link component of the
    /// indexed type owning bit `i` that points at some entity.
    pub is_owner: u32,
    /// Bit `i` is set while at least one link of the indexed type owning
    /// bit `i` points at this entity.
    pub is_linked: u32,
    alive: bool,
}

impl EntityNode {
    /// Returns `true` if the slot belongs to a live entity.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.alive
    }
}

/// Where an entity is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityLocation {
    pub archetype: ArchetypeId,
    pub row: usize,
}

/// Dense entity slot table with LIFO id reuse.
///
/// Slot `0` is never handed out.
#[derive(Debug)]
pub struct EntityNodes {
    nodes: Vec<EntityNode>,
    free_store: Vec<EntityId>,
    live: usize,
}

impl Default for EntityNodes {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl EntityNodes {
    /// Creates a table with `capacity` reserved slots.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut nodes = Self {
            nodes: vec![EntityNode::default()],
            free_store: Vec::new(),
            live: 0,
        };
        nodes.ensure_capacity(capacity);
        nodes
    }

    fn ensure_capacity(&mut self, additional: usize) {
        if additional == 0 {
            return;
        }
        let current = self.nodes.len();
        self.nodes.resize(current + additional, EntityNode::default());
        // Reverse so the lowest id is popped first.
        self.free_store.extend((current..current + additional).rev().map(|i| i as EntityId));
    }

    /// Allocates an id for an entity stored at `(archetype, row)`.
    pub fn spawn(&mut self, archetype: ArchetypeId, row: usize) -> EntityId {
        if self.free_store.is_empty() {
            self.ensure_capacity(GROWTH_BATCH);
        }
        let id = self.free_store.pop().unwrap_or_else(|| {
            let id = self.nodes.len() as EntityId;
            self.nodes.push(EntityNode::default());
            id
        });
        self.nodes[id as usize] = EntityNode {
            archetype,
            row: row as u32,
            is_owner: 0,
            is_linked: 0,
            alive: true,
        };
        self.live += 1;
        id
    }

    /// Frees `id`. Returns `false` if it was not alive.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        match self.nodes.get_mut(id as usize) {
            Some(node) if node.alive => {
                *node = EntityNode::default();
                self.free_store.push(id);
                self.live -= 1;
                true
            }
            _ => false,
        }
    }

    /// Returns `true` if `id` names a live entity.
    #[inline]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.nodes.get(id as usize).map_or(false, |node| node.alive)
    }

    /// Number of live entities.
    #[inline]
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Node of a live entity.
    #[inline]
    pub fn get(&self, id: EntityId) -> Option<&EntityNode> {
        self.nodes.get(id as usize).filter(|node| node.alive)
    }

    /// Mutable node of a live entity.
    #[inline]
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut EntityNode> {
        self.nodes.get_mut(id as usize).filter(|node| node.alive)
    }

    /// Location of a live entity.
    pub fn location(&self, id: EntityId) -> Option<EntityLocation> {
        self.get(id).map(|node| EntityLocation {
            archetype: node.archetype,
            row: node.row as usize,
        })
    }

    /// Moves a live entity to a new location.
    pub fn set_location(&mut self, id: EntityId, archetype: ArchetypeId, row: usize) {
        debug_assert!(self.is_alive(id), "set_location on dead entity {id}");
        if let Some(node) = self.get_mut(id) {
            node.archetype = archetype;
            node.row = row as u32;
        }
    }

    /// Updates the row of a live entity whose archetype is unchanged.
    pub fn set_row(&mut self, id: EntityId, row: usize) {
        if let Some(node) = self.get_mut(id) {
            node.row = row as u32;
        }
    }
}
