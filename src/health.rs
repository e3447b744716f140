//! Health reporting for resource pools

/// Point-in-time health report of a pool
///
/// # Examples
///
/// ```
/// use respool::{PoolConfiguration, ResourcePool};
///
/// let config = PoolConfiguration::new()
///     .with_initial_capacity(3)
///     .with_max_idle(3)
///     .with_max_capacity(3)
///     .with_factory(|| Ok(1u8))
///     .with_closer(|_| Ok(()));
/// let pool = ResourcePool::new(config).unwrap();
///
/// let health = pool.get_health_status();
/// assert!(health.is_healthy());
/// assert_eq!(health.idle_resources, 3);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HealthStatus {
    /// Whether the pool is serving callers without backpressure
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Fraction of capacity held by callers (0.0 to 1.0)
    pub utilization: f64,

    /// Idle resources
    pub idle_resources: usize,

    /// Open resources
    pub open_resources: usize,

    /// Callers queued for a resource
    pub waiting: usize,

    /// Hard capacity
    pub max_capacity: usize,

    /// Whether the pool has been shut down
    pub closed: bool,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    /// Create a new health status
    pub fn new(open: usize, idle: usize, waiting: usize, capacity: usize, closed: bool) -> Self {
        let in_use = open.saturating_sub(idle);
        let utilization = if capacity > 0 {
            in_use as f64 / capacity as f64
        } else {
            0.0
        };

        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if closed {
            warnings.push("Pool is shut down".to_string());
            is_healthy = false;
        }

        if waiting > 0 {
            warnings.push(format!("{waiting} caller(s) waiting for a resource"));
            is_healthy = false;
        }

        if utilization > 0.9 {
            warnings.push(format!("High utilization: {:.1}%", utilization * 100.0));
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization,
            idle_resources: idle,
            open_resources: open,
            waiting,
            max_capacity: capacity,
            closed,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturated_pool_warns() {
        let status = HealthStatus::new(4, 0, 2, 4, false);
        assert!(!status.is_healthy());
        assert_eq!(status.warning_count, 2);
        assert!(status.warnings.iter().any(|w| w.contains("2 caller(s)")));
    }

    #[test]
    fn test_closed_pool_unhealthy() {
        let status = HealthStatus::new(0, 0, 0, 4, true);
        assert!(!status.is_healthy());
        assert_eq!(status.utilization, 0.0);
    }
}
