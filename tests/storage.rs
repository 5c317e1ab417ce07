mod common;

use std::any::Any;

use archetype_store::engine::archetype::{archetype_pair_mut, Archetype};
use archetype_store::engine::storage::{Column, ErasedColumn};
use archetype_store::{ArchetypeKey, ColumnError, TypeSet, CHUNK_SIZE};

use common::{schema, Counter, Name, Position, Velocity};

#[test]
fn column_fills_chunks_in_order() {
    let mut column: Column<u32> = Column::default();
    for i in 0..(CHUNK_SIZE + 3) as u32 {
        assert_eq!(column.push(i), i as usize);
    }

    assert_eq!(column.len(), CHUNK_SIZE + 3);
    assert_eq!(column.chunk_count(), 2);
    assert_eq!(column.chunk(0).len(), CHUNK_SIZE);
    assert_eq!(column.chunk(1), &[512, 513, 514]);
    assert!(column.chunk(2).is_empty());
    assert_eq!(column.get(CHUNK_SIZE + 1), Some(&513));
    assert_eq!(column.get(CHUNK_SIZE + 3), None);
}

#[test]
fn swap_remove_moves_the_last_row_into_the_hole() {
    let mut column: Column<u32> = Column::default();
    for i in 0..(CHUNK_SIZE + 1) as u32 {
        column.push(i);
    }

    // Removing row 3 pulls the only row of the second chunk into slot 3.
    assert_eq!(column.swap_remove(3), 3);
    assert_eq!(column.len(), CHUNK_SIZE);
    assert_eq!(column.chunk_count(), 1);
    assert_eq!(column.get(3), Some(&(CHUNK_SIZE as u32)));

    // Removing the last row is a plain pop.
    let last = column.len() - 1;
    assert_eq!(column.swap_remove(last), (CHUNK_SIZE - 1) as u32);
    assert_eq!(column.len(), CHUNK_SIZE - 1);
}

#[test]
#[should_panic]
fn swap_remove_out_of_bounds_panics() {
    let mut column: Column<u32> = Column::default();
    column.push(1);
    column.swap_remove(1);
}

#[test]
fn erased_column_reads_and_writes_by_value() {
    let mut column: Box<dyn ErasedColumn> = Box::new(Column::<Counter>::default());
    column.push_default();
    column.push_default();

    column.write_value(1, Box::new(Counter(9))).expect("same type");
    let value = column.read_value(1).expect("row exists");
    assert_eq!(value.downcast_ref::<Counter>(), Some(&Counter(9)));

    let mismatch = column.write_value(0, Box::new(5u64));
    assert!(matches!(mismatch, Err(ColumnError::TypeMismatch { .. })));
    assert_eq!(
        column.value_any(0).and_then(|v: &dyn Any| v.downcast_ref::<Counter>()),
        Some(&Counter(0))
    );

    let missing = column.read_value(2);
    assert!(matches!(missing, Err(ColumnError::RowOutOfBounds { row: 2, length: 2 })));
}

#[test]
fn archetype_keys_intern_by_content() {
    let a = ArchetypeKey::new(TypeSet::from_ids(&[0, 3]), TypeSet::from_ids(&[1]));
    let b = ArchetypeKey::new(TypeSet::from_ids(&[3, 0]), TypeSet::from_ids(&[1]));
    let c = ArchetypeKey::new(TypeSet::from_ids(&[0, 3]), TypeSet::EMPTY);
    assert_eq!(a, b);
    assert_eq!(a.signature_hash(), b.signature_hash());
    assert_ne!(a, c);
    assert_eq!(a.without_component(3).with_component(3), a);
}

#[test]
fn archetype_move_transfers_shared_columns() {
    let schema = schema();
    let position = schema.component_id::<Position>().unwrap();
    let velocity = schema.component_id::<Velocity>().unwrap();
    let name = schema.component_id::<Name>().unwrap();

    let source_key = ArchetypeKey::new(TypeSet::from_ids(&[position, name]), TypeSet::EMPTY);
    let target_key = ArchetypeKey::new(TypeSet::from_ids(&[position, velocity]), TypeSet::EMPTY);
    let mut archetypes = vec![
        Archetype::new(0, source_key, &schema),
        Archetype::new(1, target_key, &schema),
    ];

    for entity in 1..=3u32 {
        let row = archetypes[0].add_entity(entity);
        archetypes[0].column_mut::<Position>(position).unwrap().get_mut(row).unwrap().x = entity as f32;
        *archetypes[0].column_mut::<Name>(name).unwrap().get_mut(row).unwrap() = Name(format!("e{entity}"));
    }

    let (source, target) = archetype_pair_mut(&mut archetypes, 0, 1);
    let (new_row, moved) = source.move_entity_to(0, target);

    assert_eq!(new_row, 0);
    assert_eq!(moved, Some(3), "the last entity fills the vacated row");
    assert_eq!(source.entity_ids(), &[3, 2]);
    assert_eq!(source.column::<Position>(position).unwrap().get(0).unwrap().x, 3.0);
    assert_eq!(source.column::<Name>(name).unwrap().get(0), Some(&Name("e3".into())));
    assert_eq!(source.column::<Name>(name).unwrap().len(), 2);

    assert_eq!(target.entity_ids(), &[1]);
    assert_eq!(target.column::<Position>(position).unwrap().get(0).unwrap().x, 1.0);
    assert_eq!(target.column::<Velocity>(velocity).unwrap().get(0), Some(&Velocity::default()));
}

#[test]
fn archetype_chunk_lengths_cover_every_row() {
    let schema = schema();
    let counter = schema.component_id::<Counter>().unwrap();
    let key = ArchetypeKey::new(TypeSet::from_ids(&[counter]), TypeSet::EMPTY);
    let mut archetype = Archetype::new(7, key, &schema);

    for entity in 0..(2 * CHUNK_SIZE + 10) as u32 {
        archetype.add_entity(entity + 1);
    }
    assert_eq!(archetype.chunk_count(), 3);
    assert_eq!(archetype.chunk_len(0), CHUNK_SIZE);
    assert_eq!(archetype.chunk_len(2), 10);
    assert_eq!(archetype.chunk_len(3), 0);
    assert_eq!(archetype.entity_chunk(2).len(), 10);
    assert_eq!(archetype.entity_chunk(2)[0], (2 * CHUNK_SIZE + 1) as u32);

    assert_eq!(archetype.remove_entity(archetype.len() - 1), None);
    assert_eq!(archetype.remove_entity(0), Some((2 * CHUNK_SIZE + 9) as u32));
    assert_eq!(archetype.len(), 2 * CHUNK_SIZE + 8);
}
