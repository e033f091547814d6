//! Performance benchmarks for the protocol and bookkeeping hot paths

use client::entity_sync::EntitySyncController;
use shared::codec::{decode, encode};
use shared::{
    ContainerLockTable, EntityKind, EntityRef, EntityState, Message, Move, PlayerRegistry, Vec3,
    World,
};
use std::time::Instant;

/// Benchmarks encoding and decoding of the most frequent message
#[test]
fn benchmark_move_codec() {
    let message = Message::Move(Move {
        entity_id: 42,
        position: Vec3::new(12.5, 0.0, -3.25),
        heading: 1.57,
    });

    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let payload = encode(&message).unwrap();
        let decoded = decode(&payload).unwrap();
        assert_eq!(decoded.kind(), message.kind());
    }

    let duration = start.elapsed();
    println!(
        "Move codec: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 1 second for 100k iterations
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks encoding an entity batch the size of a busy world
#[test]
fn benchmark_entity_batch_encoding() {
    let refs: Vec<Message> = (1..=1_000)
        .map(|id| {
            let state = EntityState::named(Vec3::new(id as f32, 0.0, 0.0), "slime");
            Message::AddEntity(EntityRef::new(id, EntityKind::Mob, &state))
        })
        .collect();

    let start = Instant::now();
    let mut bytes = 0;
    for message in &refs {
        bytes += encode(message).unwrap().len();
    }
    let duration = start.elapsed();
    println!(
        "Encoded {} AddEntity messages ({} bytes) in {:?}",
        refs.len(),
        bytes,
        duration
    );

    assert!(duration.as_millis() < 200);
}

/// Benchmarks committing a large batch into the world
#[test]
fn benchmark_batch_commit() {
    let mut world = World::new(10_000);
    let mut sync = EntitySyncController::new();
    for id in 1..=5_000 {
        sync.buffer(EntityRef::new(
            id,
            EntityKind::Mob,
            &EntityState::at(Vec3::new(id as f32, 0.0, 0.0)),
        ));
    }

    let start = Instant::now();
    let committed = sync.commit(&mut world).unwrap();
    let duration = start.elapsed();
    println!("Committed {} entities in {:?}", committed.len(), duration);

    assert_eq!(world.entity_count(), 5_000);
    assert!(duration.as_millis() < 500);
}

/// Benchmarks registry churn: joins, renames and departures
#[test]
fn benchmark_registry_operations() {
    let mut registry = PlayerRegistry::new();
    let iterations = 10_000;
    let start = Instant::now();

    for i in 0..iterations {
        let id = (i % 64) + 1;
        registry.put(&format!("player-{}", i % 97), id);
        let _ = registry.get_id("player-13");
        let _ = registry.get_name(id);
        if i % 7 == 0 {
            registry.remove_id(id);
        }
    }

    let duration = start.elapsed();
    println!(
        "Registry operations: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(registry.len() <= 64);
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks lock requests from many players on a few chests
#[test]
fn benchmark_container_locks() {
    let mut locks = ContainerLockTable::new();
    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        let chest = i % 16;
        let player = i % 8 + 1;
        locks.request_open(chest, player);
        if i % 3 == 0 {
            locks.request_close(chest, player);
        }
        if i % 1000 == 0 {
            locks.release_all(player);
        }
    }

    let duration = start.elapsed();
    println!("Container locks: {} iterations in {:?}", iterations, duration);

    assert!(duration.as_millis() < 1000);
}
