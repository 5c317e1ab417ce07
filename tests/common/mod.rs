#![allow(dead_code)]

use std::sync::Arc;

use archetype_store::{EntityId, IndexedComponent, LinkComponent, Schema, SchemaBuilder};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Velocity {
    pub dx: f32,
    pub dy: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counter(pub u32);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Name(pub String);

/// Value-indexed component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Team(pub u32);

impl IndexedComponent for Team {
    type Value = u32;

    fn indexed_value(&self) -> u32 {
        self.0
    }
}

/// Entity link component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Parent(pub Option<EntityId>);

impl LinkComponent for Parent {
    fn target(&self) -> Option<EntityId> {
        self.0
    }
}

/// Second link type, owning its own mask bit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Follows(pub Option<EntityId>);

impl LinkComponent for Follows {
    fn target(&self) -> Option<EntityId> {
        self.0
    }
}

pub struct Enemy;
pub struct Frozen;
pub struct Player;

pub fn schema() -> Arc<Schema> {
    Arc::new(
        SchemaBuilder::new()
            .component::<Position>()
            .component::<Velocity>()
            .component::<Counter>()
            .component::<Name>()
            .indexed_component::<Team>()
            .linked_component::<Parent>()
            .linked_component::<Follows>()
            .tag::<Enemy>()
            .tag::<Frozen>()
            .tag::<Player>()
            .build()
            .expect("test schema is valid"),
    )
}
