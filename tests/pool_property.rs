//! Property tests for capacity invariants.
//!
//! After any sequence of acquire/release/detach steps, the open count stays
//! within `max_capacity`, the idle store within `max_idle`, and every created
//! resource is accounted for as open or closed.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use proptest::prelude::*;
use respool::{PoolConfiguration, PooledResource, ResourcePool};

#[derive(Debug, Clone)]
enum Step {
    Acquire,
    Release(usize),
    Drop(usize),
    Detach(usize),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => Just(Step::Acquire),
        2 => any::<usize>().prop_map(Step::Release),
        1 => any::<usize>().prop_map(Step::Drop),
        1 => any::<usize>().prop_map(Step::Detach),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn capacity_bounds_hold(
        max_idle in 0usize..4,
        extra in 1usize..4,
        initial_seed in 0usize..4,
        steps in prop::collection::vec(step(), 1..60),
    ) {
        let max_capacity = max_idle + extra;
        let initial = initial_seed.min(max_idle);
        let created = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));
        let (c, d) = (Arc::clone(&created), Arc::clone(&closed));

        let pool = ResourcePool::new(
            PoolConfiguration::new()
                .with_initial_capacity(initial)
                .with_max_idle(max_idle)
                .with_max_capacity(max_capacity)
                .with_factory(move || Ok(c.fetch_add(1, Ordering::SeqCst)))
                .with_closer(move |_| {
                    d.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
        )
        .unwrap();

        let mut held: Vec<PooledResource<usize>> = Vec::new();
        let mut detached = 0usize;

        for step in steps {
            match step {
                Step::Acquire => {
                    if let Some(res) = pool.try_acquire() {
                        prop_assert!(held.iter().all(|h| **h != *res));
                        held.push(res);
                    } else {
                        prop_assert_eq!(held.len(), max_capacity);
                    }
                }
                Step::Release(i) if !held.is_empty() => {
                    let res = held.swap_remove(i % held.len());
                    pool.release(res).unwrap();
                }
                Step::Drop(i) if !held.is_empty() => {
                    drop(held.swap_remove(i % held.len()));
                }
                Step::Detach(i) if !held.is_empty() => {
                    let _ = held.swap_remove(i % held.len()).detach();
                    detached += 1;
                }
                _ => {}
            }

            prop_assert!(pool.open_count() <= max_capacity);
            prop_assert!(pool.len() <= max_idle);
            prop_assert_eq!(pool.open_count(), held.len() + pool.len());
            prop_assert_eq!(
                created.load(Ordering::SeqCst),
                pool.open_count() + closed.load(Ordering::SeqCst) + detached
            );
        }

        drop(held);
        pool.shutdown();
        prop_assert_eq!(pool.open_count(), 0);
    }
}
