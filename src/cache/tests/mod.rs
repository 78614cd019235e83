use std::collections::HashSet;

use rand::{thread_rng, Rng};

use self::format::init_logging;

use super::*;
use crate::providers::budget_provider::BudgetProvider;
use crate::slab::META_SIZE;
use crate::util::page_size;


/// An object size such that exactly `max` slots fit into a default slab.
fn obj_size_for(max: usize) -> usize {
    CacheConfig::default().region_size().unwrap() / max - META_SIZE
}

/// Checks that every slab sits in the bucket matching its fill state
/// and that the cache count adds up.
fn check_invariants<P: Provider + Clone>(cache: &Cache<P>) {
    let mut slabs = 0;
    let mut objects = 0;
    for bucket in Bucket::ALL {
        let list = cache.list(bucket);
        let mut members = 0;
        for slab in cache.slabs_in(bucket) {
            assert_eq!(slab.link().owner(), Some(bucket.list_id()));
            match bucket {
                Bucket::Free => assert!(slab.is_empty(), "{slab:?} should be empty."),
                Bucket::Partial => assert!(
                    !slab.is_empty() && !slab.is_full(),
                    "{slab:?} should be partially filled."
                ),
                Bucket::Full => assert!(slab.is_full(), "{slab:?} should be full."),
            }
            assert_eq!(slab.free_slots().len(), slab.max() - slab.count());
            objects += slab.count();
            members += 1;
        }
        assert_eq!(members, list.len());
        slabs += members;
    }
    assert_eq!(slabs, cache.slab_count());
    assert_eq!(objects, cache.len());
}

#[test]
fn test_new_1() {
    let cache = Cache::new(64).unwrap();
    let slab_max = 2 * page_size() / (64 + META_SIZE);
    assert_eq!(cache.obj_size(), 64);
    assert_eq!(cache.slab_count(), 8);
    assert_eq!(cache.capacity(), 8 * slab_max);
    assert_eq!(
        cache.stats(),
        CacheStats {
            objects: 0,
            capacity: 8 * slab_max,
            free_slabs: 8,
            partial_slabs: 0,
            full_slabs: 0,
        }
    );
    assert!(cache.is_empty());
    check_invariants(&cache);
}

#[test]
fn test_new_2() {
    assert_eq!(Cache::new(0).unwrap_err(), Error::ZeroSize);
    assert!(matches!(
        Cache::new(2 * page_size()).unwrap_err(),
        Error::ObjectTooLarge { .. }
    ));
    assert!(matches!(
        Cache::with_config(8, CacheConfig::new(0, 2)).unwrap_err(),
        Error::InvalidConfig(_)
    ));
    assert!(matches!(
        Cache::with_config(8, CacheConfig::new(1, 0)).unwrap_err(),
        Error::InvalidConfig(_)
    ));
}

#[test]
fn test_new_3() {
    assert_eq!(
        Cache::with_config(8, CacheConfig::new(usize::MAX, 1)).unwrap_err(),
        Error::OutOfMemory { size: usize::MAX }
    );
    let provider = BudgetProvider::new(4);
    assert!(matches!(
        Cache::with_provider(8, CacheConfig::new(usize::MAX / 2, 1), &provider).unwrap_err(),
        Error::OutOfMemory { .. }
    ));
    assert_eq!(provider.live(), 0);
}

#[test]
fn test_new_unwinds() {
    let provider = BudgetProvider::new(3);
    let err = Cache::with_provider(16, CacheConfig::default(), &provider).unwrap_err();
    assert!(matches!(err, Error::OutOfMemory { .. }));
    assert_eq!(provider.live(), 0, "Slabs built before the failure should be released.");
}

#[test]
fn test_drop_releases_everything() {
    let _guard = init_logging();
    let provider = BudgetProvider::new(8);
    {
        let mut cache = Cache::with_provider(100, CacheConfig::default(), &provider).unwrap();
        assert_eq!(provider.live(), 8);
        for _ in 0..100 {
            cache.allocate().unwrap();
        }
    }
    assert_eq!(provider.live(), 0);
}

#[test]
fn test_exhaustion() {
    let _guard = init_logging();
    let mut cache = Cache::with_config(obj_size_for(2), CacheConfig::new(1, 2)).unwrap();
    assert_eq!(cache.capacity(), 2);

    let p1 = cache.allocate().unwrap();
    let p2 = cache.allocate().unwrap();
    assert_ne!(p1, p2);
    assert_eq!(cache.allocate(), Err(Error::Exhausted));
    assert_eq!(cache.len(), 2);
    check_invariants(&cache);

    // Freed capacity is usable again, but the cache never grows.
    unsafe { cache.release(p2) };
    assert_eq!(cache.allocate(), Ok(p2));
    assert_eq!(cache.allocate(), Err(Error::Exhausted));
    assert_eq!(cache.slab_count(), 1);
}

#[test]
fn test_fill_drain() {
    let mut cache = Cache::with_config(obj_size_for(2), CacheConfig::new(1, 2)).unwrap();
    unsafe {
        let p1 = cache.allocate().unwrap();
        assert_eq!(cache.bucket_of(p1), Bucket::Partial);
        check_invariants(&cache);

        let p2 = cache.allocate().unwrap();
        assert_eq!(cache.bucket_of(p2), Bucket::Full);
        check_invariants(&cache);

        cache.release(p2);
        assert_eq!(cache.bucket_of(p1), Bucket::Partial);
        assert_eq!(cache.stats().partial_slabs, 1);
        check_invariants(&cache);

        cache.release(p1);
        assert_eq!(cache.stats().free_slabs, 1);
        assert!(cache.is_empty());
        check_invariants(&cache);
    }
}

#[test]
fn test_single_slot_slabs() {
    let mut cache = Cache::with_config(obj_size_for(1), CacheConfig::new(2, 2)).unwrap();
    assert_eq!(cache.capacity(), 2);
    unsafe {
        let p1 = cache.allocate().unwrap();
        assert_eq!(cache.bucket_of(p1), Bucket::Full);
        assert_eq!(cache.stats().partial_slabs, 0);
        check_invariants(&cache);

        let p2 = cache.allocate().unwrap();
        assert_eq!(cache.bucket_of(p2), Bucket::Full);
        assert_eq!(cache.allocate(), Err(Error::Exhausted));
        check_invariants(&cache);

        cache.release(p1);
        assert_eq!(cache.stats().free_slabs, 1);
        assert_eq!(cache.stats().full_slabs, 1);
        check_invariants(&cache);
    }
}

#[test]
fn test_prefers_partial_slabs() {
    let mut cache = Cache::new(48).unwrap();
    let p1 = cache.allocate().unwrap();
    let p2 = cache.allocate().unwrap();
    let p3 = cache.allocate().unwrap();
    let slot_size = 48 + META_SIZE;
    assert_eq!(p2.as_ptr() as usize - p1.as_ptr() as usize, slot_size);
    assert_eq!(p3.as_ptr() as usize - p2.as_ptr() as usize, slot_size);
    assert_eq!(cache.stats().partial_slabs, 1);
    assert_eq!(cache.stats().free_slabs, 7);

    // The lowest slot is reused first.
    unsafe {
        cache.release(p1);
        cache.release(p3);
    }
    assert_eq!(cache.allocate(), Ok(p1));
    check_invariants(&cache);
}

#[test]
fn test_allocation_order() {
    let _guard = init_logging();
    let obj_size = obj_size_for(3);
    let mut cache = Cache::with_config(obj_size, CacheConfig::new(3, 2)).unwrap();
    let owner = |p| unsafe { Slab::<MmapProvider>::owner(p, obj_size) };

    // Free slabs are taken from the tail of the free list, the last one created.
    let objs: Vec<_> = (0..7).map(|_| cache.allocate().unwrap()).collect();
    let owners: Vec<_> = objs.iter().map(|&p| owner(p)).collect();
    assert_eq!(owners[..3], [NodeId(2); 3]);
    assert_eq!(owners[3..6], [NodeId(1); 3]);
    assert_eq!(owners[6], NodeId(0));
    assert_eq!(cache.stats().full_slabs, 2);
    assert_eq!(cache.stats().partial_slabs, 1);

    // full -> partial appends slab 2 behind slab 0, so it is filled next.
    unsafe { cache.release(objs[0]) };
    let ids: Vec<_> = cache.slabs_in(Bucket::Partial).map(|slab| slab.id()).collect();
    assert_eq!(ids, [NodeId(0), NodeId(2)]);
    assert_eq!(cache.allocate(), Ok(objs[0]));
    check_invariants(&cache);

    // Slab 0 is the only partial one left.
    let p = cache.allocate().unwrap();
    assert_eq!(owner(p), NodeId(0));
    assert_eq!(p.as_ptr() as usize - objs[6].as_ptr() as usize, obj_size + META_SIZE);
    check_invariants(&cache);
}

#[test]
fn test_release_mixed_slabs() {
    let _guard = init_logging();
    let obj_size = obj_size_for(2);
    let mut cache = Cache::with_config(obj_size, CacheConfig::new(4, 2)).unwrap();

    // Two full slabs, one partial and one free.
    let objs: Vec<_> = (0..5).map(|_| cache.allocate().unwrap()).collect();
    for (i, p) in objs.iter().enumerate() {
        unsafe { p.as_ptr().write_bytes(i as u8 + 1, obj_size) };
    }
    assert_eq!(
        cache.stats(),
        CacheStats {
            objects: 5,
            capacity: 8,
            free_slabs: 1,
            partial_slabs: 1,
            full_slabs: 2,
        }
    );
    check_invariants(&cache);

    unsafe {
        assert_eq!(cache.bucket_of(objs[0]), Bucket::Full);
        assert_eq!(cache.bucket_of(objs[4]), Bucket::Partial);

        // full -> partial
        cache.release(objs[1]);
        assert_eq!(cache.bucket_of(objs[0]), Bucket::Partial);
        check_invariants(&cache);

        // partial -> free, spliced from the head of the partial list
        cache.release(objs[4]);
        assert_eq!(cache.stats().free_slabs, 2);
        check_invariants(&cache);

        // partial -> free
        cache.release(objs[0]);
        assert_eq!(cache.stats().free_slabs, 3);
        assert_eq!(cache.bucket_of(objs[2]), Bucket::Full);
        check_invariants(&cache);
    }

    // Untouched objects kept their contents.
    for i in [2, 3] {
        let bytes = unsafe { core::slice::from_raw_parts(objs[i].as_ptr(), obj_size) };
        assert!(bytes.iter().all(|&b| b == i as u8 + 1));
    }
}

#[test]
fn test_random_1() {
    let mut rng = thread_rng();
    let obj_size = 56;
    let mut cache = Cache::with_config(obj_size, CacheConfig::new(3, 1)).unwrap();
    let capacity = cache.capacity();
    let mut live: Vec<NonNull<u8>> = vec![];

    for step in 0..20_000 {
        if live.is_empty() || (live.len() < capacity && rng.gen_bool(0.6)) {
            let p = cache.allocate().unwrap();
            unsafe { p.as_ptr().write_bytes(0xCD, obj_size) };
            live.push(p);
        } else {
            let p = live.swap_remove(rng.gen_range(0..live.len()));
            unsafe { cache.release(p) };
        }
        assert_eq!(cache.len(), live.len());
        if step % 64 == 0 {
            check_invariants(&cache);
        }
    }

    let unique: HashSet<_> = live.iter().collect();
    assert_eq!(unique.len(), live.len(), "Live objects should be distinct.");
    check_invariants(&cache);
}

#[test]
fn test_random_2() {
    let mut rng = thread_rng();
    let mut cache = Cache::with_config(obj_size_for(3), CacheConfig::new(5, 2)).unwrap();
    let mut live: Vec<NonNull<u8>> = vec![];

    for _ in 0..2_000 {
        match cache.allocate() {
            Ok(p) => live.push(p),
            Err(err) => {
                assert_eq!(err, Error::Exhausted);
                assert_eq!(live.len(), cache.capacity());
            }
        }
        if !live.is_empty() && rng.gen_bool(0.45) {
            let p = live.swap_remove(rng.gen_range(0..live.len()));
            unsafe { cache.release(p) };
        }
        check_invariants(&cache);
    }

    for p in live.drain(..) {
        unsafe { cache.release(p) };
    }
    assert_eq!(cache.stats().free_slabs, 5);
    check_invariants(&cache);
}
