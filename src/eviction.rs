//! Eviction policies and idle bookkeeping

use std::time::{Duration, Instant};

/// Eviction policy for idle resources
///
/// # Examples
///
/// ```
/// use respool::{EvictionPolicy, PoolConfiguration};
/// use std::time::Duration;
///
/// let config = PoolConfiguration::<u8>::new()
///     .with_idle_timeout(Duration::from_secs(30));
///
/// assert!(matches!(config.eviction_policy(), EvictionPolicy::IdleTimeout(_)));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// No eviction
    #[default]
    None,

    /// Time-to-live: resources expire a fixed duration after creation
    TimeToLive(Duration),

    /// Idle timeout: resources expire after sitting unused
    IdleTimeout(Duration),

    /// Combined: TTL or idle timeout
    Combined {
        ttl: Duration,
        idle_timeout: Duration,
    },
}

impl EvictionPolicy {
    /// Whether a resource created at `created_at` and last released at
    /// `last_released_at` has to be discarded at `now`
    pub fn is_expired(&self, created_at: Instant, last_released_at: Instant, now: Instant) -> bool {
        let aged = |since: Instant, limit: Duration| now.saturating_duration_since(since) >= limit;

        match *self {
            EvictionPolicy::None => false,
            EvictionPolicy::TimeToLive(ttl) => aged(created_at, ttl),
            EvictionPolicy::IdleTimeout(timeout) => aged(last_released_at, timeout),
            EvictionPolicy::Combined { ttl, idle_timeout } => {
                aged(created_at, ttl) || aged(last_released_at, idle_timeout)
            }
        }
    }
}

/// One idle resource plus the timestamps eviction needs
pub(crate) struct IdleEntry<T> {
    pub resource: T,
    pub created_at: Instant,
    pub last_released_at: Instant,
}

impl<T> IdleEntry<T> {
    /// Wrap a resource that is being released now
    pub fn new(resource: T, created_at: Instant) -> Self {
        Self {
            resource,
            created_at,
            last_released_at: Instant::now(),
        }
    }

    pub fn is_expired(&self, policy: &EvictionPolicy) -> bool {
        policy.is_expired(self.created_at, self.last_released_at, Instant::now())
    }
}
