//! Multi-threaded allocation stress test: many threads racing to create
//! entities in the same world must never hand out a duplicate id, and every
//! entity must end up independently addressable.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread;

use chunked_ecs::{Component, World};

#[derive(Component, Clone)]
struct Counter {
    value: u32,
}

#[test]
fn sixteen_threads_allocating_concurrently_never_collide() {
    const THREADS: usize = 16;
    const PER_THREAD: u32 = 512;

    let world = World::new();
    let seen_ids = Arc::new(Mutex::new(HashSet::new()));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let world = world.clone();
            let seen_ids = Arc::clone(&seen_ids);
            thread::spawn(move || {
                let mut local_ids = Vec::with_capacity(PER_THREAD as usize);
                for i in 0..PER_THREAD {
                    let entity = world.create_entity(Counter { value: t as u32 * PER_THREAD + i }).unwrap();
                    local_ids.push(entity.id());
                }
                seen_ids.lock().unwrap().extend(local_ids);
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let ids = seen_ids.lock().unwrap();
    assert_eq!(ids.len(), THREADS * PER_THREAD as usize);

    let found = world.find_components::<Counter>();
    assert_eq!(found.len(), THREADS * PER_THREAD as usize);
}
