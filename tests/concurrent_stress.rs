//! Many threads hammering one small pool.
//!
//! Every resource carries a unique id; a shared ownership map catches any
//! id that is handed to two callers at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use dashmap::DashMap;
use respool::{PoolConfiguration, PoolError, ResourcePool};

const THREADS: usize = 16;
const ROUNDS: usize = 200;
const MAX_CAPACITY: usize = 4;

fn storm_pool(created: &Arc<AtomicUsize>, closed: &Arc<AtomicUsize>, idle_timeout: Duration) -> ResourcePool<usize> {
    let next = Arc::clone(created);
    let gone = Arc::clone(closed);
    let config = PoolConfiguration::new()
        .with_initial_capacity(2)
        .with_max_idle(2)
        .with_max_capacity(MAX_CAPACITY)
        .with_idle_timeout(idle_timeout)
        .with_factory(move || Ok(next.fetch_add(1, Ordering::SeqCst)))
        .with_closer(move |_| {
            gone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        // fail roughly one probe in seven to exercise the discard path
        .with_health_check(|id: &usize| {
            if id % 7 == 3 {
                Err("probe failed".into())
            } else {
                Ok(())
            }
        });
    ResourcePool::new(config).unwrap()
}

#[test]
fn no_resource_is_owned_twice() {
    let created = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(AtomicUsize::new(0));
    let pool = storm_pool(&created, &closed, Duration::from_millis(2));
    let owners: Arc<DashMap<usize, usize>> = Arc::new(DashMap::new());
    let peak = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..THREADS)
        .map(|worker| {
            let pool = pool.clone();
            let owners = Arc::clone(&owners);
            let peak = Arc::clone(&peak);
            thread::spawn(move || {
                for round in 0..ROUNDS {
                    let res = pool.acquire_timeout(Duration::from_secs(10)).unwrap();
                    if let Some(previous) = owners.insert(*res, worker) {
                        panic!("resource {} owned by {previous} and {worker}", *res);
                    }
                    peak.fetch_max(pool.open_count(), Ordering::SeqCst);
                    if round % 5 == 0 {
                        thread::sleep(Duration::from_micros(200));
                    }
                    owners.remove(&*res);
                    if round % 2 == 0 {
                        pool.release(res).unwrap();
                    } else {
                        drop(res);
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= MAX_CAPACITY);
    assert!(pool.open_count() <= MAX_CAPACITY);
    assert!(pool.len() <= 2);
    assert_eq!(pool.waiting(), 0);
    assert_eq!(
        created.load(Ordering::SeqCst) - closed.load(Ordering::SeqCst),
        pool.open_count()
    );

    pool.shutdown();
    assert_eq!(pool.open_count(), 0);
    assert_eq!(created.load(Ordering::SeqCst), closed.load(Ordering::SeqCst));
}

#[test]
fn shutdown_during_storm_never_hangs() {
    let created = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(AtomicUsize::new(0));
    let pool = storm_pool(&created, &closed, Duration::ZERO);

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let pool = pool.clone();
            thread::spawn(move || {
                loop {
                    match pool.acquire() {
                        Ok(res) => {
                            thread::sleep(Duration::from_micros(100));
                            drop(res);
                        }
                        Err(_) => return,
                    }
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(50));
    pool.shutdown();

    for worker in workers {
        worker.join().unwrap();
    }

    assert!(pool.is_closed());
    assert_eq!(pool.open_count(), 0);
    assert_eq!(created.load(Ordering::SeqCst), closed.load(Ordering::SeqCst));
}

#[test]
fn short_deadlines_never_lose_a_handoff() {
    let created = Arc::new(AtomicUsize::new(0));
    let next = Arc::clone(&created);
    let pool = ResourcePool::new(
        PoolConfiguration::new()
            .with_max_idle(1)
            .with_max_capacity(1)
            .with_factory(move || Ok(next.fetch_add(1, Ordering::SeqCst)))
            .with_closer(|_| Ok(())),
    )
    .unwrap();

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            thread::spawn(move || {
                let mut served = 0;
                for _ in 0..2000 {
                    match pool.acquire_timeout(Duration::from_micros(50)) {
                        Ok(res) => {
                            served += 1;
                            drop(res);
                        }
                        Err(PoolError::Timeout(_)) => {}
                        Err(other) => panic!("unexpected acquire error: {other}"),
                    }
                }
                served
            })
        })
        .collect();

    let served: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();

    // a delivery dropped by a timed-out caller would leave the slot open
    // with nothing idle to account for it
    assert!(served > 0);
    assert_eq!(pool.waiting(), 0);
    assert_eq!(pool.open_count(), pool.len());
    assert!(pool.open_count() <= 1);
    assert_eq!(created.load(Ordering::SeqCst), 1);
}
