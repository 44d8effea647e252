//! Unit tests for the hybrid collector: eager frees, cycle reclamation,
//! threshold growth and sweep idempotence.

use memory_manager::{Handle, Heap, HeapConfig, Value};

fn manual_heap(initial_capacity: usize) -> Heap {
    Heap::with_config(HeapConfig {
        initial_capacity,
        collect_on_allocate: false,
        collect_on_release: false,
    })
}

fn empty_pair(heap: &Heap) -> Handle {
    heap.allocate(Value::pair(Handle::null(), Handle::null()))
}

#[test]
fn test_acyclic_structure_freed_without_collection() {
    let heap = manual_heap(16);
    let items: Vec<_> = (0..5).map(|i| heap.allocate(Value::Integer(i))).collect();
    let list = heap.list(items);
    assert_eq!(heap.live_objects(), 10);

    drop(list);
    let stats = heap.stats();
    assert_eq!(stats.live_objects, 0);
    assert_eq!(stats.eager_frees, 10);
    assert_eq!(stats.collections, 0);
}

#[test]
fn test_two_cycle_reclaimed_by_one_collection() {
    let heap = manual_heap(16);
    let a = empty_pair(&heap);
    let b = empty_pair(&heap);
    a.set_first(&b).unwrap();
    b.set_first(&a).unwrap();
    drop((a, b));
    assert_eq!(heap.live_objects(), 2);

    heap.collect_now();
    let stats = heap.stats();
    assert_eq!(stats.live_objects, 0);
    assert_eq!(stats.swept, 2);
}

#[test]
fn test_three_cycle_leaves_heap_empty() {
    let heap = manual_heap(16);
    let a = empty_pair(&heap);
    let b = empty_pair(&heap);
    let c = empty_pair(&heap);
    a.set_second(&b).unwrap();
    b.set_second(&c).unwrap();
    c.set_second(&a).unwrap();
    drop((a, b, c));

    heap.collect_now();
    assert!(heap.objects().is_empty());
    assert!(heap.roots().is_empty());
}

#[test]
fn test_cycle_hanging_off_a_root_survives() {
    let heap = manual_heap(16);
    let root = empty_pair(&heap);
    let a = empty_pair(&heap);
    let b = empty_pair(&heap);
    a.set_first(&b).unwrap();
    b.set_first(&a).unwrap();
    root.set_second(&a).unwrap();
    drop((a, b));

    heap.collect_now();
    assert_eq!(heap.live_objects(), 3);
    let a = root.second().unwrap();
    assert!(a.first().unwrap().first().unwrap().ptr_eq(&a));
}

#[test]
fn test_garbage_cycle_releases_live_child() {
    let heap = manual_heap(16);
    let shared = heap.allocate(Value::string("kept"));
    let a = heap.allocate(Value::pair(shared.clone(), Handle::null()));
    let b = heap.allocate(Value::pair(shared.clone(), a.clone()));
    a.set_second(&b).unwrap();
    assert_eq!(shared.ref_count(), Some(3));
    drop((a, b));

    heap.collect_now();
    assert_eq!(heap.live_objects(), 1);
    assert_eq!(shared.ref_count(), Some(1));
    assert_eq!(shared.read().as_str(), Some("kept"));
}

#[test]
fn test_garbage_cycle_owning_acyclic_tail() {
    let heap = manual_heap(16);
    let tail = heap.list(vec![
        heap.allocate(Value::Integer(1)),
        heap.allocate(Value::Integer(2)),
    ]);
    let a = heap.allocate(Value::pair(tail, Handle::null()));
    a.set_second(&a).unwrap();
    drop(a);
    assert_eq!(heap.live_objects(), 5);

    heap.collect_now();
    assert_eq!(heap.live_objects(), 0);
}

#[test]
fn test_second_collection_changes_nothing() {
    let heap = manual_heap(4);
    let keep: Vec<_> = (0..10).map(|i| heap.allocate(Value::Integer(i))).collect();
    let a = empty_pair(&heap);
    a.set_first(&a).unwrap();
    drop(a);

    heap.collect_now();
    let first = heap.stats();
    heap.collect_now();
    let second = heap.stats();
    assert_eq!(first.live_objects, second.live_objects);
    assert_eq!(first.capacity, second.capacity);
    assert_eq!(second.swept, first.swept);
    assert_eq!(keep.len(), 10);
}

#[test]
fn test_capacity_grows_to_one_and_a_half_live() {
    let heap = manual_heap(4);
    let keep: Vec<_> = (0..10).map(|i| heap.allocate(Value::Integer(i))).collect();
    heap.collect_now();
    assert_eq!(heap.capacity(), 15);
    drop(keep);
    heap.collect_now();
    assert_eq!(heap.capacity(), 15);
}

#[test]
fn test_capacity_never_shrinks() {
    let heap = Heap::with_config(HeapConfig {
        initial_capacity: 8,
        ..HeapConfig::default()
    });
    let mut last = heap.capacity();
    let mut keep = Vec::new();
    for round in 0..50 {
        let a = empty_pair(&heap);
        a.set_first(&a).unwrap();
        if round % 3 == 0 {
            keep.push(a);
        }
        let now = heap.capacity();
        assert!(now >= last);
        last = now;
    }
    keep.clear();
    heap.collect_now();
    assert!(heap.capacity() >= last);
}

#[test]
fn test_ten_thousand_integer_pairs_stay_under_capacity() {
    let heap = Heap::with_config(HeapConfig {
        initial_capacity: 64,
        ..HeapConfig::default()
    });
    let mut kept = Vec::new();
    for i in 0..10_000i64 {
        let pair = heap.allocate(Value::pair(
            heap.allocate(Value::Integer(i)),
            heap.allocate(Value::Integer(i + 1)),
        ));
        if i % 10 == 0 {
            kept.push(pair);
        }
        let stats = heap.stats();
        assert!(stats.live_objects <= stats.capacity);
    }

    let stats = heap.stats();
    assert!(stats.collections > 0);
    assert!(stats.capacity > 64);
    assert_eq!(stats.live_objects, kept.len() * 3);
    assert_eq!(kept[500].first().unwrap().read().as_integer(), Some(5_000));

    drop(kept);
    assert_eq!(heap.live_objects(), 0);
}

#[test]
fn test_cyclic_garbage_triggers_automatic_collection() {
    let heap = Heap::with_config(HeapConfig {
        initial_capacity: 64,
        ..HeapConfig::default()
    });
    for _ in 0..1_000 {
        let a = empty_pair(&heap);
        let b = empty_pair(&heap);
        a.set_first(&b).unwrap();
        b.set_first(&a).unwrap();
        let stats = heap.stats();
        assert!(stats.live_objects <= stats.capacity + 1);
    }
    let stats = heap.stats();
    assert!(stats.collections > 0);
    assert!(stats.swept > 0);
    assert!(stats.live_objects <= stats.capacity);
}

#[test]
fn test_manual_heap_never_collects_by_itself() {
    let heap = manual_heap(2);
    for _ in 0..10 {
        let a = empty_pair(&heap);
        a.set_first(&a).unwrap();
    }
    let stats = heap.stats();
    assert_eq!(stats.collections, 0);
    assert_eq!(stats.live_objects, 10);
}
