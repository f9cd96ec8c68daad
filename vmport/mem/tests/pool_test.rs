//! Slot pool tests for vmport-mem

use vmport_core::PortError;
use vmport_mem::{SlotPool, Tier, TieredPool};

#[derive(Debug, PartialEq)]
struct Session {
    id: u32,
    bytes_sent: usize,
}

static REGISTRY: SlotPool<Session, 4> = SlotPool::new();

#[test]
fn test_static_registry_flow() {
    let handle = REGISTRY
        .reserve(Session {
            id: 7,
            bytes_sent: 0,
        })
        .unwrap();

    let found = REGISTRY.find(|s| s.id == 7).unwrap();
    assert_eq!(found, handle);

    REGISTRY.with(found, |s| s.bytes_sent += 128).unwrap();
    assert_eq!(REGISTRY.with_ref(found, |s| s.bytes_sent), Ok(128));

    let session = REGISTRY.release(found).unwrap();
    assert_eq!(session.id, 7);
    assert_eq!(REGISTRY.find(|s| s.id == 7), Err(PortError::ItemNotFound));
}

#[test]
fn test_pool_cycles_through_all_slots() {
    let pool: SlotPool<u32, 8> = SlotPool::new();
    let mut handles = Vec::new();

    for round in 0..3u32 {
        for i in 0..8 {
            handles.push(pool.reserve(round * 8 + i).unwrap());
        }
        assert!(pool.stats().is_full());
        assert_eq!(pool.reserve(99), Err(PortError::PoolExhausted));

        for handle in handles.drain(..) {
            pool.release(handle).unwrap();
        }
        assert!(pool.stats().is_empty());
    }

    assert_eq!(pool.stats().min_free_slots, 0);
}

#[test]
fn test_tiered_preference_restores_after_drain() {
    let pool: TieredPool<&'static str, 2, 4> = TieredPool::new();

    let a = pool.reserve("a").unwrap();
    let b = pool.reserve("b").unwrap();
    let c = pool.reserve("c").unwrap();
    assert_eq!(c.tier(), Tier::Fallback);

    pool.release(a).unwrap();
    pool.release(b).unwrap();
    let d = pool.reserve("d").unwrap();
    assert_eq!(d.tier(), Tier::Preferred);

    assert_eq!(pool.stats(Tier::Preferred).used_slots, 1);
    assert_eq!(pool.stats(Tier::Fallback).used_slots, 1);
}
