mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use archetype_store::{partition_sections, EntityId, EntityStore, SchemaBuilder, CHUNK_SIZE};
use proptest::prelude::*;

use common::{schema, Counter, Enemy, Frozen, Name, Parent, Position, Team, Velocity};

struct World {
    store: EntityStore,
    plain: EntityId,
    moving: EntityId,
    enemy: EntityId,
    frozen_enemy: EntityId,
    ghost: EntityId,
}

fn world() -> World {
    let mut store = EntityStore::new(schema());

    let plain = store.create_entity();
    store.add_component(plain, Position::default()).unwrap();

    let moving = store.create_entity();
    store.add_component(moving, Position::default()).unwrap();
    store.add_component(moving, Velocity::default()).unwrap();

    let enemy = store.create_entity();
    store.add_component(enemy, Position::default()).unwrap();
    store.add_tag::<Enemy>(enemy).unwrap();

    let frozen_enemy = store.create_entity();
    store.add_component(frozen_enemy, Position::default()).unwrap();
    store.add_component(frozen_enemy, Velocity::default()).unwrap();
    store.add_tag::<Enemy>(frozen_enemy).unwrap();
    store.add_tag::<Frozen>(frozen_enemy).unwrap();

    let ghost = store.create_entity();
    store.add_component(ghost, Velocity::default()).unwrap();

    World { store, plain, moving, enemy, frozen_enemy, ghost }
}

fn sorted(mut ids: Vec<EntityId>) -> Vec<EntityId> {
    ids.sort_unstable();
    ids
}

#[test]
fn refinements_narrow_the_match() {
    let w = world();
    let store = &w.store;
    let all = || store.query::<(Position,)>();

    assert_eq!(
        sorted(all().entities(store)),
        vec![w.plain, w.moving, w.enemy, w.frozen_enemy]
    );
    assert_eq!(sorted(all().all_tags::<(Enemy,)>().entities(store)), vec![w.enemy, w.frozen_enemy]);
    assert_eq!(
        sorted(all().all_tags::<(Enemy, Frozen)>().entities(store)),
        vec![w.frozen_enemy]
    );
    assert_eq!(
        sorted(all().any_tags::<(Enemy, Frozen)>().entities(store)),
        vec![w.enemy, w.frozen_enemy]
    );
    assert_eq!(
        sorted(all().without_all_tags::<(Enemy, Frozen)>().entities(store)),
        vec![w.plain, w.moving, w.enemy]
    );
    assert_eq!(
        sorted(all().without_any_tags::<(Enemy,)>().entities(store)),
        vec![w.plain, w.moving]
    );
    assert_eq!(
        sorted(all().all_components::<(Velocity,)>().entities(store)),
        vec![w.moving, w.frozen_enemy]
    );
    assert_eq!(
        sorted(all().any_components::<(Velocity, Counter)>().entities(store)),
        vec![w.moving, w.frozen_enemy]
    );
    assert_eq!(
        sorted(all().without_all_components::<(Position, Velocity)>().entities(store)),
        vec![w.plain, w.enemy]
    );
    assert_eq!(
        sorted(all().without_any_components::<(Velocity,)>().entities(store)),
        vec![w.plain, w.enemy]
    );

    let velocity_only = sorted(store.query::<(Velocity,)>().entities(store));
    assert_eq!(velocity_only, vec![w.moving, w.frozen_enemy, w.ghost]);
}

#[test]
fn empty_refinement_result_yields_nothing() {
    let w = world();
    let mut query = w
        .store
        .query::<(Position,)>()
        .all_tags::<(Frozen,)>()
        .without_any_tags::<(Enemy,)>();
    assert!(query.archetypes(&w.store).is_empty());
    assert_eq!(query.chunks(&w.store).count(), 0);
}

#[test]
fn new_archetypes_are_picked_up_incrementally() {
    let mut w = world();
    let mut query = w.store.query::<(Position,)>();
    assert_eq!(query.entity_count(&w.store), 4);
    let matched = query.archetypes(&w.store).len();

    let late = w.store.create_entity();
    w.store.add_component(late, Counter(1)).unwrap();
    w.store.add_component(late, Position::default()).unwrap();

    assert_eq!(query.entity_count(&w.store), 5);
    assert_eq!(query.archetypes(&w.store).len(), matched + 1);
    assert_eq!(*query.entities(&w.store).last().unwrap(), late);

    // Rows moving between known archetypes need no rescan.
    w.store.remove_component::<Counter>(late).unwrap();
    assert_eq!(query.archetypes(&w.store).len(), matched + 1);
    assert_eq!(query.entity_count(&w.store), 5);
}

#[test]
fn archetypes_without_rows_yield_no_chunks() {
    let mut w = world();
    w.store.delete_entity(w.enemy).unwrap();
    let mut query = w.store.query::<(Position,)>().all_tags::<(Enemy,)>();
    let chunks: Vec<_> = query.chunks(&w.store).collect();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].entities, &[w.frozen_enemy]);
}

#[test]
fn chunks_follow_storage_layout() {
    let mut store = EntityStore::new(schema());
    let total = 2 * CHUNK_SIZE + 76;
    for i in 0..total {
        let entity = store.create_entity();
        store.add_component(entity, Counter(i as u32)).unwrap();
        store.add_component(entity, Velocity::default()).unwrap();
    }

    let mut query = store.query::<(Counter, Velocity)>();
    let chunks: Vec<_> = query.chunks(&store).collect();
    let lengths: Vec<usize> = chunks.iter().map(|chunk| chunk.len()).collect();
    assert_eq!(lengths, vec![CHUNK_SIZE, CHUNK_SIZE, 76]);

    let mut next = 0;
    for chunk in &chunks {
        let (counters, velocities) = chunk.components;
        assert_eq!(counters.len(), chunk.entities.len());
        assert_eq!(velocities.len(), chunk.entities.len());
        for (entity, counter) in chunk.entities.iter().zip(counters) {
            assert_eq!(counter.0, next);
            assert_eq!(store.get_component::<Counter>(*entity).unwrap(), Some(counter));
            next += 1;
        }
    }
    assert_eq!(next as usize, total);
}

fn moving_store(count: usize) -> EntityStore {
    let mut store = EntityStore::new(schema());
    for i in 0..count {
        let entity = store.create_entity();
        store.add_component(entity, Position { x: i as f32, y: 0.0 }).unwrap();
        store
            .add_component(entity, Velocity { dx: 1.0, dy: (i % 7) as f32 })
            .unwrap();
    }
    store
}

fn positions(store: &EntityStore) -> Vec<(EntityId, Position)> {
    let mut out = Vec::new();
    let mut query = store.query::<(Position,)>();
    for chunk in query.chunks(store) {
        let (positions,) = chunk.components;
        out.extend(chunk.entities.iter().copied().zip(positions.iter().copied()));
    }
    out.sort_unstable_by_key(|(entity, _)| *entity);
    out
}

#[test]
fn run_visits_each_chunk_once() {
    let mut store = moving_store(CHUNK_SIZE + 100);
    let mut query = store.query::<(Position, Velocity)>();
    let mut calls = 0;
    let mut rows = 0;
    query
        .for_each(|entities: &[EntityId], (positions, velocities): (&mut [Position], &mut [Velocity])| {
            calls += 1;
            rows += entities.len();
            for (p, v) in positions.iter_mut().zip(velocities.iter()) {
                p.x += v.dx;
                p.y += v.dy;
            }
        })
        .run(&mut store);

    assert_eq!(calls, 2);
    assert_eq!(rows, CHUNK_SIZE + 100);
    let moved = positions(&store);
    assert_eq!(moved[0].1, Position { x: 1.0, y: 0.0 });
    assert_eq!(moved[8].1, Position { x: 9.0, y: 1.0 });
}

#[test]
fn parallel_run_matches_sequential_run() {
    let count = 3 * CHUNK_SIZE + 41;
    let mut sequential = moving_store(count);
    let mut parallel = moving_store(count);

    let step = |_: &[EntityId], (positions, velocities): (&mut [Position], &mut [Velocity])| {
        for (p, v) in positions.iter_mut().zip(velocities.iter()) {
            p.x += v.dx;
            p.y += v.dy;
        }
    };

    let mut query = sequential.query::<(Position, Velocity)>();
    for _ in 0..3 {
        query.for_each(step).run(&mut sequential);
    }

    let mut query = parallel.query::<(Position, Velocity)>();
    for _ in 0..3 {
        query
            .for_each(step)
            .worker_count(3)
            .min_parallel_chunk_length(8)
            .run_parallel(&mut parallel);
    }

    assert_eq!(positions(&sequential), positions(&parallel));
}

#[test]
fn parallel_sections_respect_the_alignment_multiple() {
    let mut store = moving_store(CHUNK_SIZE + 76);
    let calls = AtomicUsize::new(0);
    let misaligned = AtomicUsize::new(0);
    let rows = AtomicUsize::new(0);

    let mut query = store.query::<(Position, Velocity)>();
    let multiple = query.multiple();
    assert_eq!(multiple, 4);

    let action = |entities: &[EntityId], (positions, _): (&mut [Position], &mut [Velocity])| {
        calls.fetch_add(1, Ordering::Relaxed);
        rows.fetch_add(entities.len(), Ordering::Relaxed);
        assert_eq!(positions.len(), entities.len());
        if positions.len() % multiple != 0 {
            misaligned.fetch_add(1, Ordering::Relaxed);
        }
    };
    query
        .for_each(action)
        .worker_count(3)
        .min_parallel_chunk_length(1)
        .run_parallel(&mut store);

    // 512 rows split 128 x 4; 76 rows split 20, 20, 20, 16.
    assert_eq!(calls.load(Ordering::Relaxed), 8);
    assert_eq!(rows.load(Ordering::Relaxed), CHUNK_SIZE + 76);
    assert_eq!(misaligned.load(Ordering::Relaxed), 0);
    assert_eq!(query.entity_count(&store), CHUNK_SIZE + 76);
}

#[test]
fn short_chunks_run_on_the_calling_thread() {
    let mut store = moving_store(100);
    let calls = AtomicUsize::new(0);
    let mut query = store.query::<(Position,)>();
    let action = |_: &[EntityId], _: (&mut [Position],)| {
        calls.fetch_add(1, Ordering::Relaxed);
    };
    query
        .for_each(action)
        .worker_count(3)
        .min_parallel_chunk_length(64)
        .run_parallel(&mut store);
    assert_eq!(calls.load(Ordering::Relaxed), 1);
}

#[test]
fn huge_minimum_length_runs_sequentially() {
    let mut store = moving_store(CHUNK_SIZE + 1);
    let calls = AtomicUsize::new(0);
    let mut query = store.query::<(Position,)>();
    let action = |_: &[EntityId], _: (&mut [Position],)| {
        calls.fetch_add(1, Ordering::Relaxed);
    };
    query
        .for_each(action)
        .worker_count(3)
        .min_parallel_chunk_length(usize::MAX)
        .run_parallel(&mut store);
    assert_eq!(calls.load(Ordering::Relaxed), 2);
}

#[test]
fn section_buffers_are_reused_across_runs() {
    let mut store = moving_store(3 * CHUNK_SIZE);
    let mut query = store.query::<(Position, Velocity)>();
    assert_eq!(query.pooled_buffers(), 0);

    let step = |_: &[EntityId], (positions, velocities): (&mut [Position], &mut [Velocity])| {
        for (p, v) in positions.iter_mut().zip(velocities.iter()) {
            p.x += v.dx;
        }
    };
    for _ in 0..4 {
        query
            .for_each(step)
            .worker_count(3)
            .min_parallel_chunk_length(1)
            .run_parallel(&mut store);
        assert_eq!(query.pooled_buffers(), 1, "one buffer serves every chunk and run");
    }

    query.for_each(step).run(&mut store);
    assert_eq!(query.pooled_buffers(), 1);
    assert_eq!(positions(&store)[0].1, Position { x: 5.0, y: 0.0 });
}

#[test]
#[should_panic(expected = "indexed component")]
fn writing_a_value_indexed_member_panics() {
    let mut store = EntityStore::new(schema());
    let entity = store.create_entity();
    store.add_component(entity, Team(1)).unwrap();
    let mut query = store.query::<(Team,)>();
    query
        .for_each(|_: &[EntityId], (teams,): (&mut [Team],)| teams[0].0 = 2)
        .run(&mut store);
}

#[test]
#[should_panic(expected = "indexed component")]
fn writing_a_link_member_panics() {
    let store = EntityStore::new(schema());
    let mut query = store.query::<(Position, Parent)>();
    let _ = query.for_each(|_: &[EntityId], _: (&mut [Position], &mut [Parent])| {});
}

#[test]
fn indexed_members_stay_readable_through_chunks() {
    let mut store = EntityStore::new(schema());
    let entity = store.create_entity();
    store.add_component(entity, Team(1)).unwrap();

    let mut query = store.query::<(Team,)>();
    let teams: Vec<Team> = query.chunks(&store).flat_map(|chunk| chunk.components.0.to_vec()).collect();
    assert_eq!(teams, vec![Team(1)]);

    store.set_component(entity, Team(2)).unwrap();
    assert!(store.lookup_entities::<Team>(&1).is_empty());
    assert_eq!(store.lookup_entities::<Team>(&2), &[entity]);
}

#[test]
fn multiple_is_the_lcm_of_member_multiples() {
    let store = EntityStore::new(schema());
    assert_eq!(store.query::<(Position,)>().multiple(), 4);
    assert_eq!(store.query::<(Counter,)>().multiple(), 8);
    assert_eq!(store.query::<(Position, Counter)>().multiple(), 8);
    assert_eq!(store.query::<(Team, Name)>().multiple(), 8);

    let schema = Arc::new(
        SchemaBuilder::new()
            .component::<Position>()
            .component::<Counter>()
            .alignment_multiple::<Position>(3)
            .build()
            .unwrap(),
    );
    let store = EntityStore::new(schema);
    assert_eq!(store.query::<(Position,)>().multiple(), 3);
    assert_eq!(store.query::<(Position, Counter)>().multiple(), 24);
}

#[test]
#[should_panic]
fn duplicate_member_panics() {
    let store = EntityStore::new(schema());
    let _ = store.query::<(Position, Position)>();
}

#[test]
#[should_panic]
fn unregistered_member_panics() {
    #[derive(Clone, Default)]
    struct Unknown;
    let store = EntityStore::new(schema());
    let _ = store.query::<(Unknown,)>();
}

#[test]
#[should_panic]
fn query_from_another_schema_panics() {
    let store = EntityStore::new(schema());
    let other = EntityStore::new(schema());
    let mut query = store.query::<(Position,)>();
    query.refresh(&other);
}

#[test]
fn partition_examples() {
    assert_eq!(partition_sections(512, 4, 4), vec![0..128, 128..256, 256..384, 384..512]);
    assert_eq!(partition_sections(76, 4, 4), vec![0..20, 20..40, 40..60, 60..76]);
    assert_eq!(partition_sections(10, 4, 8), vec![0..8, 8..10, 10..10, 10..10]);
    assert_eq!(partition_sections(0, 3, 4), vec![0..0, 0..0, 0..0]);
}

proptest! {
    #[test]
    fn partitions_cover_in_order(len in 0usize..4096, tasks in 1usize..16, multiple in 1usize..33) {
        let sections = partition_sections(len, tasks, multiple);
        prop_assert_eq!(sections.len(), tasks);

        let mut expected_start = 0;
        let last_non_empty = sections.iter().rposition(|s| !s.is_empty());
        for (i, section) in sections.iter().enumerate() {
            prop_assert_eq!(section.start, expected_start);
            prop_assert!(section.start <= section.end);
            if Some(i) != last_non_empty && !section.is_empty() {
                prop_assert_eq!(section.len() % multiple, 0);
            }
            expected_start = section.end;
        }
        prop_assert_eq!(expected_start, len);
    }
}
