//! Unit tests for root handles, embedded slots and the writers.

use memory_manager::{AccessError, Handle, Heap, HeapConfig, Value, ValueKind};

#[cfg(test)]
mod root_tests {
    use super::*;

    #[test]
    fn test_count_tracks_every_root() {
        let heap = Heap::new();
        let a = heap.allocate(Value::Integer(1));
        let copies: Vec<_> = (0..5).map(|_| a.clone()).collect();
        assert_eq!(a.ref_count(), Some(6));
        assert_eq!(heap.stats().roots, 6);
        drop(copies);
        assert_eq!(a.ref_count(), Some(1));
    }

    #[test]
    fn test_move_keeps_single_root() {
        let heap = Heap::new();
        let a = heap.allocate(Value::Integer(1));
        let moved = a;
        assert_eq!(heap.stats().roots, 1);
        assert_eq!(moved.ref_count(), Some(1));
    }

    #[test]
    fn test_assigning_null_releases() {
        let heap = Heap::new();
        let mut h = heap.allocate(Value::string("gone"));
        assert_eq!(h.read().as_str(), Some("gone"));
        h = Handle::null();
        assert!(h.is_null());
        assert_eq!(heap.live_objects(), 0);
    }

    #[test]
    fn test_assigning_another_handle() {
        let heap = Heap::new();
        let a = heap.allocate(Value::Integer(1));
        let mut h = heap.allocate(Value::Integer(2));
        assert_eq!(heap.live_objects(), 2);
        assert_eq!(h.read().as_integer(), Some(2));
        h = a.clone();
        assert!(h.ptr_eq(&a));
        assert_eq!(heap.live_objects(), 1);
        assert_eq!(a.ref_count(), Some(2));
    }

    #[test]
    fn test_null_handles_compare_equal() {
        assert!(Handle::null().ptr_eq(&Handle::default()));
        assert_eq!(Handle::null().address(), None);
        assert_eq!(Handle::null().ref_count(), None);
        assert!(Handle::null().heap().is_none());
    }
}

#[cfg(test)]
mod structure_tests {
    use super::*;

    #[test]
    fn test_structural_reads_check_kind() {
        let heap = Heap::new();
        let n = heap.allocate(Value::Integer(1));
        assert_eq!(n.first().unwrap_err(), AccessError::NotAPair);
        assert_eq!(n.second().unwrap_err(), AccessError::NotAPair);
        assert_eq!(n.element(0).unwrap_err(), AccessError::NotAVector);
        assert_eq!(n.len(), Err(AccessError::NotAVector));
        assert_eq!(n.is_empty(), Err(AccessError::NotAVector));
    }

    #[test]
    fn test_element_out_of_bounds() {
        let heap = Heap::new();
        let v = heap.allocate(Value::vector([heap.allocate(Value::Integer(1))]));
        assert_eq!(
            v.element(1).unwrap_err(),
            AccessError::IndexOutOfBounds { index: 1, len: 1 }
        );
        assert_eq!(v.element(0).unwrap().read().as_integer(), Some(1));
    }

    #[test]
    fn test_push_and_set_element() {
        let heap = Heap::new();
        let v = heap.allocate(Value::vector(Vec::new()));
        assert_eq!(v.is_empty(), Ok(true));
        let items: Vec<_> = (0..3).map(|i| heap.allocate(Value::Integer(i))).collect();
        for item in &items {
            v.push(item).unwrap();
        }
        assert_eq!(v.len(), Ok(3));
        assert_eq!(v.is_empty(), Ok(false));

        v.set_element(1, &items[2]).unwrap();
        assert!(v.element(1).unwrap().ptr_eq(&items[2]));
        assert_eq!(items[1].ref_count(), Some(1));
        assert_eq!(items[2].ref_count(), Some(3));
    }

    #[test]
    fn test_self_reference_through_setter() {
        let heap = Heap::new();
        let p = heap.allocate(Value::pair(Handle::null(), Handle::null()));
        p.set_first(&p).unwrap();
        assert_eq!(p.ref_count(), Some(2));
        assert!(p.first().unwrap().ptr_eq(&p));
    }

    #[test]
    fn test_set_clears_structure() {
        let heap = Heap::new();
        let child = heap.allocate(Value::Integer(1));
        let p = heap.allocate(Value::pair(child.clone(), child.clone()));
        assert_eq!(child.ref_count(), Some(3));
        p.set(Value::Boolean(false)).unwrap();
        assert_eq!(child.ref_count(), Some(1));
        assert_eq!(p.kind(), ValueKind::Boolean);
    }

    #[test]
    fn test_cutting_a_cycle_frees_the_detached_cell() {
        let heap = Heap::with_config(HeapConfig {
            collect_on_allocate: false,
            collect_on_release: false,
            ..HeapConfig::default()
        });
        let a = heap.allocate(Value::pair(Handle::null(), Handle::null()));
        let b = heap.allocate(Value::pair(a.clone(), Handle::null()));
        a.set_first(&b).unwrap();
        // `b` stays reachable through `a`.
        drop(b);
        heap.collect_now();
        assert_eq!(heap.live_objects(), 2);

        // Cutting at `a` drops `b` to zero, which in turn releases `a`.
        a.set_first(&Handle::null()).unwrap();
        assert!(a.first().unwrap().is_null());
        assert!(a.first().unwrap().read().is_null());
        assert_eq!(heap.live_objects(), 1);
        assert_eq!(a.ref_count(), Some(1));
    }
}
