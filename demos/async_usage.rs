//! Async usage examples for ResourcePool

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use respool::{PoolConfiguration, PoolError, ResourcePool};
use tokio::time::sleep;

fn session_pool(max_capacity: usize) -> Result<ResourcePool<u32>, PoolError> {
    let next_id = Arc::new(AtomicU32::new(1));
    ResourcePool::new(
        PoolConfiguration::new()
            .with_max_idle(max_capacity)
            .with_max_capacity(max_capacity)
            .with_factory(move || Ok(next_id.fetch_add(1, Ordering::Relaxed)))
            .with_closer(|_| Ok(())),
    )
}

#[tokio::main]
async fn main() -> Result<(), PoolError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== respool - Async Examples ===\n");

    basic_async().await?;
    timeout_handling().await?;
    concurrent_access().await?;

    Ok(())
}

async fn basic_async() -> Result<(), PoolError> {
    println!("1. Basic Async:");
    let pool = session_pool(2)?;

    {
        let session = pool.acquire_async().await?;
        println!("   Got session: {}", *session);
    }

    println!("   Idle after return: {}\n", pool.len());
    Ok(())
}

async fn timeout_handling() -> Result<(), PoolError> {
    println!("2. Timeout Handling:");
    let pool = session_pool(1)?;

    let _held = pool.acquire_async().await?;
    match pool.acquire_async_timeout(Duration::from_millis(100)).await {
        Ok(_) => println!("   Unexpected success"),
        Err(e) => println!("   Expected timeout: {e}"),
    }

    println!();
    Ok(())
}

async fn concurrent_access() -> Result<(), PoolError> {
    println!("3. Concurrent Access:");
    let pool = session_pool(3)?;

    let mut handles = vec![];
    for i in 0..10 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let session = pool.acquire_async().await?;
            println!("   Task {} got session {}", i, *session);
            sleep(Duration::from_millis(20)).await;
            Ok::<_, PoolError>(())
        }));
    }

    for handle in handles {
        handle.await.expect("task panicked")?;
    }

    let metrics = pool.get_metrics();
    println!(
        "   Created {} sessions for {} acquires ({} hand-offs)",
        metrics.total_created, metrics.total_acquired, metrics.handoffs
    );

    pool.shutdown();
    Ok(())
}
