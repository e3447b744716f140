//! Pool configuration options

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{BoxError, PoolError, PoolResult};
use crate::eviction::EvictionPolicy;

/// Produces one new resource
pub type Factory<T> = Arc<dyn Fn() -> Result<T, BoxError> + Send + Sync>;

/// Releases the underlying handle of a resource
pub type Closer<T> = Arc<dyn Fn(T) -> Result<(), BoxError> + Send + Sync>;

/// Liveness probe, `Err` means the resource must be discarded
pub type HealthCheck<T> = Arc<dyn Fn(&T) -> Result<(), BoxError> + Send + Sync>;

/// Configuration for resource pool behavior
///
/// # Examples
///
/// ```
/// use respool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::<u32>::new()
///     .with_initial_capacity(2)
///     .with_max_idle(4)
///     .with_max_capacity(8)
///     .with_idle_timeout(Duration::from_secs(60))
///     .with_factory(|| Ok(7))
///     .with_closer(|_| Ok(()));
///
/// assert_eq!(config.max_capacity, 8);
/// assert!(config.validate().is_ok());
/// ```
pub struct PoolConfiguration<T> {
    /// Resources created eagerly when the pool is built
    pub initial_capacity: usize,

    /// Hard ceiling on simultaneously open resources
    pub max_capacity: usize,

    /// Ceiling on resources held idle
    pub max_idle: usize,

    /// Maximum idle age before a resource is discarded on next access
    pub idle_timeout: Option<Duration>,

    /// Maximum age since creation before a resource is discarded on next access
    pub max_lifetime: Option<Duration>,

    /// Default deadline for `acquire` and `acquire_async`, `None` waits forever
    pub acquire_timeout: Option<Duration>,

    /// Discards tolerated in a single acquire before idle entries are replaced
    /// without probing
    pub max_discards_per_acquire: usize,

    pub(crate) factory: Option<Factory<T>>,
    pub(crate) closer: Option<Closer<T>>,
    pub(crate) health_check: Option<HealthCheck<T>>,
}

impl<T> Default for PoolConfiguration<T> {
    fn default() -> Self {
        Self {
            initial_capacity: 0,
            max_capacity: 10,
            max_idle: 10,
            idle_timeout: None,
            max_lifetime: None,
            acquire_timeout: None,
            max_discards_per_acquire: 16,
            factory: None,
            closer: None,
            health_check: None,
        }
    }
}

impl<T> Clone for PoolConfiguration<T> {
    fn clone(&self) -> Self {
        Self {
            initial_capacity: self.initial_capacity,
            max_capacity: self.max_capacity,
            max_idle: self.max_idle,
            idle_timeout: self.idle_timeout,
            max_lifetime: self.max_lifetime,
            acquire_timeout: self.acquire_timeout,
            max_discards_per_acquire: self.max_discards_per_acquire,
            factory: self.factory.clone(),
            closer: self.closer.clone(),
            health_check: self.health_check.clone(),
        }
    }
}

impl<T> fmt::Debug for PoolConfiguration<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfiguration")
            .field("initial_capacity", &self.initial_capacity)
            .field("max_capacity", &self.max_capacity)
            .field("max_idle", &self.max_idle)
            .field("idle_timeout", &self.idle_timeout)
            .field("max_lifetime", &self.max_lifetime)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("max_discards_per_acquire", &self.max_discards_per_acquire)
            .field("factory", &self.factory.is_some())
            .field("closer", &self.closer.is_some())
            .field("health_check", &self.health_check.is_some())
            .finish()
    }
}

impl<T> PoolConfiguration<T> {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of resources created up front
    pub fn with_initial_capacity(mut self, count: usize) -> Self {
        self.initial_capacity = count;
        self
    }

    /// Set the maximum number of open resources
    ///
    /// # Examples
    ///
    /// ```
    /// use respool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::<i32>::new()
    ///     .with_max_capacity(50);
    ///
    /// assert_eq!(config.max_capacity, 50);
    /// ```
    pub fn with_max_capacity(mut self, size: usize) -> Self {
        self.max_capacity = size;
        self
    }

    /// Set the maximum number of idle resources
    pub fn with_max_idle(mut self, size: usize) -> Self {
        self.max_idle = size;
        self
    }

    /// Set idle timeout, zero disables it
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set the maximum lifetime of a resource
    pub fn with_max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = Some(lifetime);
        self
    }

    /// Set the default acquire deadline
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Set the discard cap for a single acquire
    pub fn with_max_discards(mut self, count: usize) -> Self {
        self.max_discards_per_acquire = count;
        self
    }

    /// Set the resource factory
    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Set the function that closes a resource
    pub fn with_closer<F>(mut self, closer: F) -> Self
    where
        F: Fn(T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.closer = Some(Arc::new(closer));
        self
    }

    /// Set the liveness probe run on idle resources before they are handed out
    pub fn with_health_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.health_check = Some(Arc::new(check));
        self
    }

    /// Check capacity bounds and required hooks
    ///
    /// # Examples
    ///
    /// ```
    /// use respool::{PoolConfiguration, PoolError};
    ///
    /// let config = PoolConfiguration::<i32>::new()
    ///     .with_initial_capacity(5)
    ///     .with_max_idle(2)
    ///     .with_factory(|| Ok(1))
    ///     .with_closer(|_| Ok(()));
    ///
    /// assert!(matches!(config.validate(), Err(PoolError::InvalidConfig(_))));
    /// ```
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_capacity == 0 {
            return Err(PoolError::invalid_config("max_capacity must be at least 1"));
        }
        if self.initial_capacity > self.max_idle {
            return Err(PoolError::invalid_config(format!(
                "initial_capacity ({}) exceeds max_idle ({})",
                self.initial_capacity, self.max_idle
            )));
        }
        if self.max_idle > self.max_capacity {
            return Err(PoolError::invalid_config(format!(
                "max_idle ({}) exceeds max_capacity ({})",
                self.max_idle, self.max_capacity
            )));
        }
        if self.max_discards_per_acquire == 0 {
            return Err(PoolError::invalid_config("max_discards_per_acquire must be at least 1"));
        }
        if self.factory.is_none() {
            return Err(PoolError::invalid_config("factory is required"));
        }
        if self.closer.is_none() {
            return Err(PoolError::invalid_config("closer is required"));
        }
        Ok(())
    }

    /// Eviction policy derived from the idle timeout and max lifetime
    pub fn eviction_policy(&self) -> EvictionPolicy {
        let enabled = |d: Option<Duration>| d.filter(|d| !d.is_zero());

        match (enabled(self.max_lifetime), enabled(self.idle_timeout)) {
            (Some(ttl), Some(idle_timeout)) => EvictionPolicy::Combined { ttl, idle_timeout },
            (Some(ttl), None) => EvictionPolicy::TimeToLive(ttl),
            (None, Some(idle)) => EvictionPolicy::IdleTimeout(idle),
            (None, None) => EvictionPolicy::None,
        }
    }
}
