#![allow(dead_code)]

use std::sync::Arc;

use archetype_store::{EntityId, EntityStore, IndexedComponent, Schema, SchemaBuilder};

pub const AGENTS_SMALL: usize = 10_000;
pub const AGENTS_MED: usize = 100_000;
pub const AGENTS_LARGE: usize = 1_000_000;

#[derive(Clone, Copy, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Default)]
pub struct Wealth {
    pub value: f32,
}

#[derive(Clone, Copy, Default)]
pub struct Productivity {
    pub rate: f32,
}

#[derive(Clone, Copy, Default)]
pub struct Region(pub u32);

impl IndexedComponent for Region {
    type Value = u32;

    fn indexed_value(&self) -> u32 {
        self.0
    }
}

pub struct Active;

pub fn schema() -> Arc<Schema> {
    Arc::new(
        SchemaBuilder::new()
            .component::<Position>()
            .component::<Wealth>()
            .component::<Productivity>()
            .indexed_component::<Region>()
            .tag::<Active>()
            .build()
            .expect("bench schema is valid"),
    )
}

/// Store with `agent_count` entities holding position, wealth and productivity.
pub fn populated_store(agent_count: usize) -> (EntityStore, Vec<EntityId>) {
    let mut store = EntityStore::new(schema());
    let archetype = store.get_or_create_archetype(
        archetype_store::ArchetypeKey::new(
            store
                .schema()
                .component_set::<(Position, Wealth, Productivity)>()
                .expect("registered"),
            archetype_store::TypeSet::EMPTY,
        ),
    );
    let entities = (0..agent_count)
        .map(|_| store.create_entity_in(archetype).expect("archetype exists"))
        .collect();
    (store, entities)
}
