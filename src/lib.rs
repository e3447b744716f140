//! # respool
//!
//! Bounded, thread-safe pool for expensive, reusable resources such as
//! network or database connections.
//!
//! ## Features
//!
//! - Hard capacity limit with FIFO backpressure for callers that arrive when
//!   the pool is exhausted
//! - Direct hand-off of released resources to the oldest waiter
//! - Eager warm-up of an initial set of resources
//! - Idle timeout and max lifetime eviction, optional health checks
//! - Blocking and async acquire, with optional deadlines
//! - Automatic return of resources via RAII (Drop trait)
//! - Metrics, health reports and Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use respool::{PoolConfiguration, ResourcePool};
//!
//! let config = PoolConfiguration::new()
//!     .with_initial_capacity(2)
//!     .with_max_idle(2)
//!     .with_max_capacity(4)
//!     .with_factory(|| Ok(String::from("connection")))
//!     .with_closer(|_conn| Ok(()));
//!
//! let pool = ResourcePool::new(config).unwrap();
//! {
//!     let conn = pool.acquire().unwrap();
//!     println!("Got: {}", *conn);
//!     // Resource automatically returned when `conn` goes out of scope
//! }
//! pool.shutdown();
//! ```

mod config;
mod errors;
mod eviction;
mod health;
mod metrics;
mod pool;
mod waiters;

pub use config::{Closer, Factory, HealthCheck, PoolConfiguration};
pub use errors::{BoxError, PoolError, PoolResult};
pub use eviction::EvictionPolicy;
pub use health::HealthStatus;
pub use metrics::{MetricsExporter, PoolMetrics};
pub use pool::{PooledResource, ResourcePool};
