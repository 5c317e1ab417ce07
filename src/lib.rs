//! # Archetype Store
//!
//! In-memory entity/component data engine: a columnar store that groups
//! entities by their exact set of components and tags.
//!
//! ## Design Goals
//! - Archetype-based chunked storage for cache efficiency
//! - `O(1)` reverse lookup from component value to entities
//! - Change tracking through per-kind event logs
//! - Chunked, optionally parallel, query execution
//! - Single-writer mutation enforced by `&mut` borrows
//!
//! ## Example
//! ```ignore
//! use std::sync::Arc;
//! use archetype_store::prelude::*;
//!
//! let schema = Arc::new(SchemaBuilder::new().component::<Position>().tag::<Player>().build()?);
//! let mut store = EntityStore::new(schema);
//! let entity = store.create_entity();
//! store.add_component(entity, Position(1.0))?;
//! store.add_tag::<Player>(entity)?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_inception)]
#![deny(dead_code)]

pub mod engine;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use engine::store::{
    EntityStore,
    EMPTY_ARCHETYPE,
};

pub use engine::config::StoreConfig;

pub use engine::component::{
    Component,
    IndexedComponent,
    LinkComponent,
    IndexKind,
    Schema,
    SchemaBuilder,
};

pub use engine::archetype::Archetype;

pub use engine::entity::{
    EntityLocation,
    EntityNode,
};

pub use engine::ids::{
    IdArray,
    IdArrayHeap,
};

pub use engine::index::{
    ValueIndex,
    EntityIndex,
};

pub use engine::events::{
    EventAction,
    EventFilter,
    EventKind,
    EventRecorder,
};

pub use engine::query::{
    ArchetypeQuery,
    ComponentSet,
    QueryChunk,
};

pub use engine::parallel::{
    QueryJob,
    partition_sections,
};

pub use engine::error::{
    ECSResult,
    ECSError,
    RegistryError,
    ColumnError,
};

pub use engine::types::{
    EntityId,
    ComponentId,
    TagId,
    ArchetypeId,
    ArchetypeKey,
    TypeSet,
    CHUNK_SIZE,
};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used store types.
///
/// Import with:
/// ```rust
/// use archetype_store::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        EntityStore,
        StoreConfig,
        Schema,
        SchemaBuilder,
        IndexedComponent,
        LinkComponent,
        EventFilter,
        ArchetypeQuery,
        EntityId,
        ECSResult,
        ECSError,
    };
}
