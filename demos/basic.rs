//! Basic usage examples for ResourcePool

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use respool::{PoolConfiguration, PoolError, ResourcePool};

/// Stand-in for an expensive connection handle
#[derive(Debug)]
struct Connection {
    id: u32,
}

fn connection_config(next_id: &Arc<AtomicU32>) -> PoolConfiguration<Connection> {
    let next_id = Arc::clone(next_id);
    PoolConfiguration::new()
        .with_factory(move || {
            let id = next_id.fetch_add(1, Ordering::Relaxed);
            println!("   Dialing connection #{id}");
            Ok(Connection { id })
        })
        .with_closer(|conn: Connection| {
            println!("   Closing connection #{}", conn.id);
            Ok(())
        })
}

fn main() -> Result<(), PoolError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== respool - Basic Examples ===\n");

    // Example 1: Warm pool with automatic return
    simple_pool()?;

    // Example 2: Backpressure and hand-off
    backpressure()?;

    // Example 3: Idle eviction
    idle_eviction()?;

    // Example 4: Metrics and health
    metrics_and_health()?;

    Ok(())
}

fn simple_pool() -> Result<(), PoolError> {
    println!("1. Warm Pool:");
    let next_id = Arc::new(AtomicU32::new(1));
    let pool = ResourcePool::new(
        connection_config(&next_id)
            .with_initial_capacity(2)
            .with_max_idle(2)
            .with_max_capacity(4),
    )?;

    {
        let conn = pool.acquire()?;
        println!("   Got connection #{}", conn.id);
        // Connection automatically returned when dropped
    }

    println!("   Idle after return: {}", pool.len());
    pool.shutdown();
    println!();
    Ok(())
}

fn backpressure() -> Result<(), PoolError> {
    println!("2. Backpressure:");
    let next_id = Arc::new(AtomicU32::new(1));
    let pool = ResourcePool::new(
        connection_config(&next_id)
            .with_max_idle(1)
            .with_max_capacity(1),
    )?;

    let held = pool.acquire()?;
    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || pool.acquire().map(|conn| conn.id))
    };

    while pool.waiting() == 0 {
        thread::sleep(Duration::from_millis(1));
    }
    println!("   Waiting callers: {}", pool.waiting());

    pool.release(held)?;
    let id = waiter.join().expect("waiter thread panicked")?;
    println!("   Waiter received connection #{id}");

    pool.shutdown();
    println!();
    Ok(())
}

fn idle_eviction() -> Result<(), PoolError> {
    println!("3. Idle Eviction:");
    let next_id = Arc::new(AtomicU32::new(1));
    let pool = ResourcePool::new(
        connection_config(&next_id).with_idle_timeout(Duration::from_millis(50)),
    )?;

    let first = pool.acquire()?.id;
    thread::sleep(Duration::from_millis(100));
    let second = pool.acquire()?.id;
    println!("   First #{first}, after idling #{second}");

    pool.shutdown();
    println!();
    Ok(())
}

fn metrics_and_health() -> Result<(), PoolError> {
    println!("4. Metrics and Health:");
    let next_id = Arc::new(AtomicU32::new(1));
    let pool = ResourcePool::new(
        connection_config(&next_id)
            .with_initial_capacity(1)
            .with_max_idle(1)
            .with_max_capacity(2),
    )?;

    let _a = pool.acquire()?;
    let _b = pool.acquire()?;

    let health = pool.get_health_status();
    println!("   Healthy: {}", health.is_healthy());
    println!("   Utilization: {:.0}%", health.utilization * 100.0);

    let metrics = pool.get_metrics();
    println!("   Acquired: {}, created: {}", metrics.total_acquired, metrics.total_created);
    Ok(())
}
