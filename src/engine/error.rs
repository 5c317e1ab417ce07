//! Error types for schema construction and store mutation.
//!
//! Only failures a caller can act on are modeled here:
//!
//! * [`RegistryError`]: the schema was built from an invalid declaration, or
//!   a store call named a type the schema does not know.
//! * [`ColumnError`]: a type-erased column read/write was given a value of the
//!   wrong type or a row outside the column.
//! * [`ECSError`]: the aggregate returned by the store surface.
//!
//! Broken internal invariants (moving a row the caller does not own, a query
//! over an unsupported type combination) are not errors: they panic, because
//! continuing would corrupt the dense storage. Benign inconsistencies inside
//! the inverted indexes (removing an id that is already absent) are silent
//! no-ops and never surface here.

use thiserror::Error;

use crate::engine::types::{ArchetypeId, ComponentId, EntityId};

/// Failures while building a schema or resolving a type through it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The component type was never registered.
    #[error("component `{name}` is not registered")]
    UnregisteredComponent {
        /// Rust type name of the component.
        name: &'static str,
    },

    /// The tag type was never registered.
    #[error("tag `{name}` is not registered")]
    UnregisteredTag {
        /// Rust type name of the tag.
        name: &'static str,
    },

    /// The same component type was registered twice.
    #[error("component `{name}` registered twice")]
    DuplicateComponent {
        /// Rust type name of the component.
        name: &'static str,
    },

    /// The same tag type was registered twice.
    #[error("tag `{name}` registered twice")]
    DuplicateTag {
        /// Rust type name of the tag.
        name: &'static str,
    },

    /// More component, tag or indexed types than the store can address.
    #[error("{kind} capacity exceeded ({capacity} max)")]
    Capacity {
        /// Which capacity was exceeded.
        kind: &'static str,
        /// The configured limit.
        capacity: usize,
    },
}

/// Failures of type-erased column access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColumnError {
    /// The boxed value does not have the column's element type.
    #[error("type mismatch: column stores `{expected}`")]
    TypeMismatch {
        /// Element type of the column.
        expected: &'static str,
    },

    /// The row is outside the populated range of the column.
    #[error("row {row} out of bounds (length {length})")]
    RowOutOfBounds {
        /// Requested row.
        row: usize,
        /// Current column length.
        length: usize,
    },
}

/// Aggregate error of the store surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ECSError {
    /// Schema or type resolution failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Type-erased column access failure.
    #[error(transparent)]
    Column(#[from] ColumnError),

    /// The entity id is not alive in this store.
    #[error("stale or dead entity reference: {0}")]
    StaleEntity(EntityId),

    /// The archetype id does not exist in this store.
    #[error("unknown archetype: {0}")]
    UnknownArchetype(ArchetypeId),

    /// The component id was not handed out by the store's schema.
    #[error("unknown component id: {0}")]
    UnknownComponent(ComponentId),

    /// The entity does not hold the component.
    #[error("entity {entity} has no `{name}` component")]
    MissingComponent {
        /// The entity.
        entity: EntityId,
        /// Rust type name of the component.
        name: &'static str,
    },

    /// Mutable access to an indexed component was requested; writes must go
    /// through `set_component` so the index sees the previous value.
    #[error("component `{name}` is indexed and cannot be borrowed mutably")]
    IndexedMutation {
        /// Rust type name of the component.
        name: &'static str,
    },
}

/// Result alias used throughout the store surface.
pub type ECSResult<T> = Result<T, ECSError>;
