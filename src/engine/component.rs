//! # Schema
//!
//! Assigns stable dense identifiers to component and tag types and keeps the
//! per-type factories the store needs to build columns and indexes.
//!
//! ## Purpose
//! Type information (`TypeId`, name, size, alignment, parallel alignment
//! multiple, index flavor) is collected once by a [`SchemaBuilder`] and frozen
//! into an immutable [`Schema`]. Every other layer works with the small
//! integer ids the schema hands out and never inspects types at runtime.
//!
//! ## Design
//! - Components get a [`ComponentId`] in `[0, MAX_COMPONENT_TYPES)`, tags a
//!   [`TagId`] in `[0, MAX_TAG_TYPES)`, both in registration order.
//! - Each component stores a [`ColumnFactory`]; indexed components also store
//!   an [`IndexFactory`] and own one bit in the per-entity owner / linked masks.
//! - The schema is shared as `Arc<Schema>` and is never mutated after
//!   [`SchemaBuilder::build`].
//!
//! ## Index flavors
//! - [`IndexedComponent`]: a value index from [`IndexedComponent::Value`] to
//!   the entities holding it.
//! - [`LinkComponent`]: an entity index from the referenced entity to the
//!   referencing entities.

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::Hash;
use std::mem::{align_of, size_of};

use rustc_hash::FxHashMap;

use crate::engine::error::RegistryError;
use crate::engine::index::{
    new_link_index, new_value_index, IndexFactory,
};
use crate::engine::storage::{new_column, ColumnFactory};
use crate::engine::types::{
    ComponentId, ComponentTypes, EntityId, TagId, Tags, TypeSet, MAX_COMPONENT_TYPES,
    MAX_INDEXED_TYPES, MAX_TAG_TYPES,
};

/// Byte width the default parallel alignment multiple is derived from.
pub const VECTOR_WIDTH: usize = 32;

/// Data that can be stored in a column.
///
/// Implemented for every `'static + Send + Sync + Clone + Default` type.
/// `Default` provides the value of a component that appears in a target
/// archetype during a raw structural move.
pub trait Component: 'static + Send + Sync + Clone + Default {}

impl<T: 'static + Send + Sync + Clone + Default> Component for T {}

/// Component whose value is mirrored in an inverted value index.
pub trait IndexedComponent: Component {
    /// Key type of the index.
    type Value: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// The key this component is indexed under.
    fn indexed_value(&self) -> Self::Value;
}

/// Component that references another entity, mirrored in an entity index.
pub trait LinkComponent: Component {
    /// The referenced entity, or `None` when the link is unset.
    fn target(&self) -> Option<EntityId>;
}

/// Which inverted index, if any, mirrors a component type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexKind {
    /// Not indexed.
    None,
    /// Value index keyed by [`IndexedComponent::Value`].
    Value,
    /// Entity index keyed by [`LinkComponent::target`].
    EntityLink,
}

/// Registered component type.
#[derive(Clone)]
pub struct ComponentInfo {
    /// Dense identifier.
    pub id: ComponentId,
    /// Rust type name.
    pub name: &'static str,
    /// Rust type identity.
    pub type_id: TypeId,
    /// `size_of::<T>()`.
    pub size: usize,
    /// `align_of::<T>()`.
    pub align: usize,
    /// Row multiple a parallel section boundary must respect.
    pub alignment_multiple: usize,
    /// Index flavor.
    pub index: IndexKind,
    /// Bit owned in the per-entity owner / linked masks, for indexed types.
    pub index_bit: Option<u32>,
    column_factory: ColumnFactory,
    index_factory: Option<IndexFactory>,
}

impl ComponentInfo {
    /// Factory building an empty column of this type.
    #[inline]
    pub fn column_factory(&self) -> ColumnFactory {
        self.column_factory
    }

    /// Factory building an empty index of this type, for indexed types.
    #[inline]
    pub fn index_factory(&self) -> Option<IndexFactory> {
        self.index_factory
    }
}

impl fmt::Debug for ComponentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInfo")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("size", &self.size)
            .field("align", &self.align)
            .field("alignment_multiple", &self.alignment_multiple)
            .field("index", &self.index)
            .finish()
    }
}

/// Registered tag type.
#[derive(Clone, Debug)]
pub struct TagInfo {
    /// Dense identifier.
    pub id: TagId,
    /// Rust type name.
    pub name: &'static str,
    /// Rust type identity.
    pub type_id: TypeId,
}

/// Default row multiple for a type of `size` bytes: the number of rows that
/// fill a whole number of [`VECTOR_WIDTH`]-byte vectors.
pub fn default_alignment_multiple(size: usize) -> usize {
    if size == 0 {
        return 1;
    }
    VECTOR_WIDTH / gcd(VECTOR_WIDTH, size)
}

pub(crate) fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

pub(crate) fn lcm(a: usize, b: usize) -> usize {
    if a == 0 || b == 0 {
        return a.max(b);
    }
    a / gcd(a, b) * b
}

/// Declarative, one-shot registration of component and tag types.
///
/// ## Example
/// ```ignore
/// let schema = SchemaBuilder::new()
///     .component::<Position>()
///     .indexed_component::<Team>()
///     .linked_component::<Parent>()
///     .tag::<Enemy>()
///     .build()?;
/// ```
#[derive(Default)]
pub struct SchemaBuilder {
    components: Vec<ComponentInfo>,
    tags: Vec<TagInfo>,
    indexed: u32,
    error: Option<RegistryError>,
}

impl SchemaBuilder {
    /// Starts an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plain component type.
    #[must_use]
    pub fn component<T: Component>(self) -> Self {
        self.push_component::<T>(IndexKind::None, None)
    }

    /// Registers a component type mirrored in a value index.
    #[must_use]
    pub fn indexed_component<T: IndexedComponent>(self) -> Self {
        self.push_component::<T>(IndexKind::Value, Some(new_value_index::<T>))
    }

    /// Registers a component type mirrored in an entity index.
    #[must_use]
    pub fn linked_component<T: LinkComponent>(self) -> Self {
        self.push_component::<T>(IndexKind::EntityLink, Some(new_link_index::<T>))
    }

    /// Registers a tag type.
    #[must_use]
    pub fn tag<T: 'static>(mut self) -> Self {
        if self.error.is_some() {
            return self;
        }
        let type_id = TypeId::of::<T>();
        if self.tags.iter().any(|t| t.type_id == type_id) {
            self.error = Some(RegistryError::DuplicateTag { name: type_name::<T>() });
            return self;
        }
        if self.tags.len() >= MAX_TAG_TYPES {
            self.error = Some(RegistryError::Capacity { kind: "tag", capacity: MAX_TAG_TYPES });
            return self;
        }
        self.tags.push(TagInfo {
            id: self.tags.len() as TagId,
            name: type_name::<T>(),
            type_id,
        });
        self
    }

    /// Overrides the parallel alignment multiple of an already registered
    /// component type.
    #[must_use]
    pub fn alignment_multiple<T: Component>(mut self, multiple: usize) -> Self {
        let type_id = TypeId::of::<T>();
        match self.components.iter_mut().find(|c| c.type_id == type_id) {
            Some(info) => info.alignment_multiple = multiple.max(1),
            None if self.error.is_none() => {
                self.error = Some(RegistryError::UnregisteredComponent { name: type_name::<T>() });
            }
            None => {}
        }
        self
    }

    /// Freezes the registrations into a [`Schema`].
    ///
    /// ## Errors
    /// Returns the first registration error: a duplicate type, an exceeded
    /// capacity, or an alignment override for an unknown type.
    pub fn build(self) -> Result<Schema, RegistryError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let component_by_type = self
            .components
            .iter()
            .map(|c| (c.type_id, c.id))
            .collect();
        let tag_by_type = self.tags.iter().map(|t| (t.type_id, t.id)).collect();
        Ok(Schema {
            components: self.components,
            tags: self.tags,
            component_by_type,
            tag_by_type,
        })
    }

    fn push_component<T: Component>(mut self, index: IndexKind, index_factory: Option<IndexFactory>) -> Self {
        if self.error.is_some() {
            return self;
        }
        let type_id = TypeId::of::<T>();
        if self.components.iter().any(|c| c.type_id == type_id) {
            self.error = Some(RegistryError::DuplicateComponent { name: type_name::<T>() });
            return self;
        }
        if self.components.len() >= MAX_COMPONENT_TYPES {
            self.error = Some(RegistryError::Capacity {
                kind: "component",
                capacity: MAX_COMPONENT_TYPES,
            });
            return self;
        }
        let index_bit = if index == IndexKind::None {
            None
        } else {
            if self.indexed as usize >= MAX_INDEXED_TYPES {
                self.error = Some(RegistryError::Capacity {
                    kind: "indexed component",
                    capacity: MAX_INDEXED_TYPES,
                });
                return self;
            }
            let bit = self.indexed;
            self.indexed += 1;
            Some(bit)
        };
        self.components.push(ComponentInfo {
            id: self.components.len() as ComponentId,
            name: type_name::<T>(),
            type_id,
            size: size_of::<T>(),
            align: align_of::<T>(),
            alignment_multiple: default_alignment_multiple(size_of::<T>()),
            index,
            index_bit,
            column_factory: new_column::<T>,
            index_factory,
        });
        self
    }
}

/// Immutable registry of component and tag types.
pub struct Schema {
    components: Vec<ComponentInfo>,
    tags: Vec<TagInfo>,
    component_by_type: FxHashMap<TypeId, ComponentId>,
    tag_by_type: FxHashMap<TypeId, TagId>,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("components", &self.components)
            .field("tags", &self.tags)
            .finish()
    }
}

impl Schema {
    /// All registered components, indexed by [`ComponentId`].
    pub fn components(&self) -> &[ComponentInfo] {
        &self.components
    }

    /// All registered tags, indexed by [`TagId`].
    pub fn tags(&self) -> &[TagInfo] {
        &self.tags
    }

    /// Registration record of a component id.
    ///
    /// ## Panics
    /// Panics if `id` was not handed out by this schema.
    #[inline]
    pub fn component(&self, id: ComponentId) -> &ComponentInfo {
        &self.components[id as usize]
    }

    /// Id of component type `T`.
    #[inline]
    pub fn component_id<T: 'static>(&self) -> Option<ComponentId> {
        self.component_by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Id of component type `T`, as a registry error when unknown.
    pub fn require_component<T: 'static>(&self) -> Result<ComponentId, RegistryError> {
        self.component_id::<T>()
            .ok_or(RegistryError::UnregisteredComponent { name: type_name::<T>() })
    }

    /// Id of tag type `T`.
    #[inline]
    pub fn tag_id<T: 'static>(&self) -> Option<TagId> {
        self.tag_by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Id of tag type `T`, as a registry error when unknown.
    pub fn require_tag<T: 'static>(&self) -> Result<TagId, RegistryError> {
        self.tag_id::<T>()
            .ok_or(RegistryError::UnregisteredTag { name: type_name::<T>() })
    }

    /// Component set of a tuple of component types.
    ///
    /// ## Errors
    /// Fails if any member type is not a registered component.
    pub fn component_set<L: TypeList>(&self) -> Result<ComponentTypes, RegistryError> {
        let mut set = TypeSet::default();
        for (type_id, name) in L::types() {
            let id = self
                .component_by_type
                .get(&type_id)
                .ok_or(RegistryError::UnregisteredComponent { name })?;
            set.set(*id);
        }
        Ok(set)
    }

    /// Tag set of a tuple of tag types.
    ///
    /// ## Errors
    /// Fails if any member type is not a registered tag.
    pub fn tag_set<L: TypeList>(&self) -> Result<Tags, RegistryError> {
        let mut set = TypeSet::default();
        for (type_id, name) in L::types() {
            let id = self
                .tag_by_type
                .get(&type_id)
                .ok_or(RegistryError::UnregisteredTag { name })?;
            set.set(*id);
        }
        Ok(set)
    }
}

/// A tuple of `'static` types, used to build component and tag sets.
pub trait TypeList {
    /// `TypeId` and name of each member.
    fn types() -> Vec<(TypeId, &'static str)>;
}

macro_rules! impl_type_list {
    ($($T:ident),+) => {
        impl<$($T: 'static),+> TypeList for ($($T,)+) {
            fn types() -> Vec<(TypeId, &'static str)> {
                vec![$((TypeId::of::<$T>(), type_name::<$T>())),+]
            }
        }
    };
}

impl_type_list!(A);
impl_type_list!(A, B);
impl_type_list!(A, B, C);
impl_type_list!(A, B, C, D);
impl_type_list!(A, B, C, D, E);
