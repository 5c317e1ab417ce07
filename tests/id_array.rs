use archetype_store::engine::ids::{size_class, IdArray, IdArrayHeap};
use proptest::prelude::*;

#[test]
fn single_id_is_inline_and_pair_is_pooled() {
    let mut heap = IdArrayHeap::new();
    let mut array = IdArray::EMPTY;

    array.add(5, &mut heap);
    assert_eq!(array.count(), 1);
    assert_eq!(array.start(), 5, "a single id is stored in `start`");
    assert_eq!(heap.allocated_slots(), 0);

    array.add(7, &mut heap);
    assert_eq!(array.count(), 2);
    assert_eq!(array.ids(&heap), &[5, 7]);
    assert_eq!(heap.pool(1).allocated_slots(), 1);

    array.remove_at(0, &mut heap);
    assert_eq!(array.count(), 1);
    assert_eq!(array.start(), 7, "the survivor moves back inline");
    assert_eq!(array.ids(&heap), &[7]);
    assert_eq!(heap.allocated_slots(), 0);
    assert_eq!(heap.pool(1).free_slots(), 1);
}

#[test]
fn size_class_is_ceil_log2() {
    assert_eq!(size_class(2), 1);
    assert_eq!(size_class(3), 2);
    assert_eq!(size_class(4), 2);
    assert_eq!(size_class(5), 3);
    assert_eq!(size_class(8), 3);
    assert_eq!(size_class(9), 4);
    assert_eq!(size_class(1024), 10);
}

#[test]
fn crossing_a_power_of_two_relocates_and_releases() {
    let mut heap = IdArrayHeap::new();
    let mut array = IdArray::EMPTY;
    for id in 1..=5 {
        array.add(id, &mut heap);
    }

    assert_eq!(array.ids(&heap), &[1, 2, 3, 4, 5]);
    assert_eq!(heap.pool(1).free_slots(), 1);
    assert_eq!(heap.pool(2).free_slots(), 1);
    assert_eq!(heap.pool(3).allocated_slots(), 1);
    assert_eq!(heap.allocated_slots(), 1);

    // 5 -> 4 ids moves back to class 2 and reuses its released slot.
    array.remove_at(1, &mut heap);
    assert_eq!(array.ids(&heap), &[1, 3, 4, 5]);
    assert_eq!(heap.pool(2).free_slots(), 0);
    assert_eq!(heap.pool(3).free_slots(), 1);
}

#[test]
fn removal_preserves_relative_order() {
    let mut heap = IdArrayHeap::new();
    let mut array = IdArray::EMPTY;
    for id in [10, 20, 30, 40, 50, 60] {
        array.add(id, &mut heap);
    }
    array.remove_at(2, &mut heap);
    array.remove_at(0, &mut heap);
    assert_eq!(array.ids(&heap), &[20, 40, 50, 60]);

    assert!(array.remove(50, &mut heap));
    assert!(!array.remove(50, &mut heap));
    assert_eq!(array.ids(&heap), &[20, 40, 60]);
    assert_eq!(array.position(60, &heap), Some(2));
}

#[test]
fn released_slots_are_reused_before_growth() {
    let mut heap = IdArrayHeap::new();
    let mut first = IdArray::EMPTY;
    first.add(1, &mut heap);
    first.add(2, &mut heap);
    let slot = first.start();
    first.remove_at(1, &mut heap);
    assert_eq!(heap.pool(1).free_slots(), 1);

    let mut second = IdArray::EMPTY;
    second.add(3, &mut heap);
    second.add(4, &mut heap);
    assert_eq!(second.start(), slot);
    assert_eq!(heap.pool(1).free_slots(), 0);
    assert_eq!(heap.pool(1).allocated_slots(), 1);
    assert_eq!(first.ids(&heap), &[1]);
    assert_eq!(second.ids(&heap), &[3, 4]);
}

#[test]
fn many_arrays_share_one_pool() {
    let mut heap = IdArrayHeap::new();
    let mut arrays = vec![IdArray::EMPTY; 200];
    for (i, array) in arrays.iter_mut().enumerate() {
        array.add(i as u32, &mut heap);
        array.add(i as u32 + 1000, &mut heap);
    }
    assert_eq!(heap.pool(1).allocated_slots(), 200);
    for (i, array) in arrays.iter().enumerate() {
        assert_eq!(array.ids(&heap), &[i as u32, i as u32 + 1000]);
    }

    for array in &mut arrays {
        array.clear(&mut heap);
    }
    assert_eq!(heap.allocated_slots(), 0);
    assert!(arrays.iter().all(IdArray::is_empty));
}

#[test]
#[should_panic]
fn remove_at_out_of_bounds_panics() {
    let mut heap = IdArrayHeap::new();
    let mut array = IdArray::EMPTY;
    array.add(1, &mut heap);
    array.remove_at(1, &mut heap);
}

#[derive(Clone, Debug)]
enum Op {
    Add(usize, u32),
    RemoveAt(usize, usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0usize..3, any::<u32>()).prop_map(|(a, id)| Op::Add(a, id)),
        2 => (0usize..3, any::<usize>()).prop_map(|(a, i)| Op::RemoveAt(a, i)),
    ]
}

proptest! {
    #[test]
    fn arrays_match_a_vec_model(ops in prop::collection::vec(op(), 0..400)) {
        let mut heap = IdArrayHeap::new();
        let mut arrays = [IdArray::EMPTY; 3];
        let mut model: [Vec<u32>; 3] = Default::default();

        for op in ops {
            match op {
                Op::Add(a, id) => {
                    arrays[a].add(id, &mut heap);
                    model[a].push(id);
                }
                Op::RemoveAt(a, index) => {
                    if model[a].is_empty() {
                        continue;
                    }
                    let index = index % model[a].len();
                    arrays[a].remove_at(index, &mut heap);
                    model[a].remove(index);
                }
            }
            for a in 0..3 {
                prop_assert_eq!(arrays[a].count(), model[a].len());
                prop_assert_eq!(arrays[a].ids(&heap), model[a].as_slice());
            }
        }

        let pooled = arrays.iter().filter(|a| a.count() >= 2).count();
        prop_assert_eq!(heap.allocated_slots(), pooled);
    }
}
