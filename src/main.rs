// respool - bounded resource pool
// This is just a binary wrapper - the actual library is in lib.rs
// Run demos with: cargo run --example basic

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use respool::{PoolConfiguration, ResourcePool};

fn main() -> Result<(), respool::PoolError> {
    println!("=== respool ===");
    println!("See demos/ directory for usage examples");
    println!("Run: cargo run --example basic");
    println!();

    println!("Quick Demo:");
    let next_id = Arc::new(AtomicU32::new(1));
    let config = PoolConfiguration::new()
        .with_initial_capacity(1)
        .with_max_idle(2)
        .with_max_capacity(2)
        .with_factory(move || Ok(next_id.fetch_add(1, Ordering::Relaxed)))
        .with_closer(|id| {
            println!("  Closing connection #{id}");
            Ok(())
        });
    let pool = ResourcePool::new(config)?;

    {
        let conn = pool.acquire()?;
        println!("  Got connection #{}", *conn);
    }

    println!("  Idle after return: {}", pool.len());
    pool.shutdown();
    Ok(())
}
