//! Heap Concurrency Integration Tests
//!
//! Many threads allocate, link, read and drop handles against one shared
//! heap while collections run on whichever thread crosses the threshold.

use std::sync::Arc;
use std::thread;

use memory_manager::{Handle, Heap, HeapConfig, Value, ValueKind};
use parking_lot::Mutex;

const THREADS: usize = 33;
const ROUNDS: usize = 30;

/// Per-thread xorshift generator; deterministic per seed.
struct XorShift(u64);

impl XorShift {
    fn new(seed: u64) -> Self {
        XorShift(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1)
    }

    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next() % n as u64) as usize
    }
}

fn small_heap() -> Heap {
    Heap::with_config(HeapConfig {
        initial_capacity: 32,
        ..HeapConfig::default()
    })
}

fn assert_pair_intact(handle: &Handle) {
    assert_eq!(handle.kind(), ValueKind::Pair);
    for child in [handle.first().unwrap(), handle.second().unwrap()] {
        let kind = child.kind();
        assert!(
            matches!(kind, ValueKind::Pair | ValueKind::Integer),
            "unexpected child kind {kind}"
        );
    }
}

/// Test: threads link new pairs to random shared pairs and pop the store
#[test]
fn test_concurrent_linking_with_pops() {
    let heap = small_heap();
    let store: Arc<Mutex<Vec<Handle>>> = Arc::new(Mutex::new(Vec::new()));

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let heap = heap.clone();
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut rng = XorShift::new(t as u64 + 1);
                for _ in 0..ROUNDS {
                    if rng.next() % 2 == 0 {
                        let popped = store.lock().pop();
                        drop(popped);
                    }
                    let x = heap.allocate(Value::pair(
                        heap.allocate(Value::Integer(rng.next() as i64)),
                        heap.allocate(Value::Integer(rng.next() as i64)),
                    ));
                    assert_pair_intact(&x);

                    let (first, second) = {
                        let store = store.lock();
                        if store.is_empty() {
                            (None, None)
                        } else {
                            (
                                Some(store[rng.below(store.len())].clone()),
                                Some(store[rng.below(store.len())].clone()),
                            )
                        }
                    };
                    if let (Some(first), Some(second)) = (first, second) {
                        x.set_first(&first).unwrap();
                        x.set_second(&second).unwrap();
                    }
                    assert_pair_intact(&x);
                    store.lock().push(x);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let survivors = std::mem::take(&mut *store.lock());
    for pair in &survivors {
        assert_pair_intact(pair);
    }
    let stats = heap.stats();
    assert_eq!(stats.allocations, THREADS * ROUNDS * 3);
    assert!(stats.live_objects <= stats.capacity);

    drop(survivors);
    heap.collect_now();
    assert_eq!(heap.live_objects(), 0);
    assert_eq!(heap.stats().roots, 0);
}

/// Test: each thread builds and abandons cycles; collections reclaim them
#[test]
fn test_concurrent_cyclic_garbage() {
    let heap = small_heap();
    let workers: Vec<_> = (0..8)
        .map(|_| {
            let heap = heap.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    let a = heap.allocate(Value::pair(Handle::null(), Handle::null()));
                    let b = heap.allocate(Value::pair(a.clone(), Handle::null()));
                    a.set_second(&b).unwrap();
                    assert!(a.second().unwrap().first().unwrap().ptr_eq(&a));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let stats = heap.stats();
    assert!(stats.collections > 0);
    assert!(stats.swept > 0);
    heap.collect_now();
    assert_eq!(heap.live_objects(), 0);
}

/// Test: readers walk a shared ring while writers rewire it
#[test]
fn test_readers_and_writers_share_a_ring() {
    let heap = small_heap();
    let ring: Vec<_> = (0..16)
        .map(|i| {
            heap.allocate(Value::pair(
                heap.allocate(Value::Integer(i)),
                Handle::null(),
            ))
        })
        .collect();
    for (i, node) in ring.iter().enumerate() {
        node.set_second(&ring[(i + 1) % ring.len()]).unwrap();
    }
    let ring = Arc::new(ring);

    let workers: Vec<_> = (0..6)
        .map(|t| {
            let ring = Arc::clone(&ring);
            let heap = heap.clone();
            thread::spawn(move || {
                let mut rng = XorShift::new(100 + t);
                for _ in 0..300 {
                    let node = &ring[rng.below(ring.len())];
                    if t % 2 == 0 {
                        let fresh = heap.allocate(Value::Integer(rng.next() as i64));
                        node.set_first(&fresh).unwrap();
                        let target = &ring[rng.below(ring.len())];
                        node.set_second(target).unwrap();
                    } else {
                        let mut cursor = node.clone();
                        for _ in 0..8 {
                            assert_eq!(cursor.first().unwrap().kind(), ValueKind::Integer);
                            cursor = cursor.second().unwrap();
                            assert!(!cursor.is_null());
                        }
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    drop(ring);
    heap.collect_now();
    assert_eq!(heap.live_objects(), 0);
}
