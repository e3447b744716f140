//! Metrics collection and export for resource pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metrics snapshot for a pool
///
/// # Examples
///
/// ```
/// use respool::{PoolConfiguration, ResourcePool};
///
/// let config = PoolConfiguration::new()
///     .with_initial_capacity(1)
///     .with_max_idle(2)
///     .with_max_capacity(2)
///     .with_factory(|| Ok(0u32))
///     .with_closer(|_| Ok(()));
/// let pool = ResourcePool::new(config).unwrap();
///
/// {
///     let _res = pool.acquire().unwrap();
///     let metrics = pool.get_metrics();
///     assert_eq!(metrics.total_acquired, 1);
///     assert_eq!(metrics.in_use, 1);
/// }
/// ```
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolMetrics {
    /// Successful acquires
    pub total_acquired: usize,

    /// Resources given back to the pool
    pub total_released: usize,

    /// Resources built by the factory
    pub total_created: usize,

    /// Resources passed to the closer
    pub total_destroyed: usize,

    /// Releases delivered straight to a waiter
    pub handoffs: usize,

    /// Idle resources dropped for age
    pub expired_evictions: usize,

    /// Idle resources dropped by the health check
    pub unhealthy_evictions: usize,

    /// Acquires that had to queue
    pub waits: usize,

    /// Acquires that hit their deadline
    pub timeouts: usize,

    /// Factory errors
    pub factory_failures: usize,

    /// Closer errors
    pub close_failures: usize,

    /// Open resources (idle, in use or in transit)
    pub open_resources: usize,

    /// Idle resources
    pub idle_resources: usize,

    /// Resources held by callers
    pub in_use: usize,

    /// Callers queued for a resource
    pub waiting: usize,

    /// Fraction of capacity held by callers (0.0 to 1.0)
    pub utilization: f64,

    /// Hard capacity
    pub max_capacity: usize,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_acquired".to_string(), self.total_acquired.to_string());
        metrics.insert("total_released".to_string(), self.total_released.to_string());
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("total_destroyed".to_string(), self.total_destroyed.to_string());
        metrics.insert("handoffs".to_string(), self.handoffs.to_string());
        metrics.insert("expired_evictions".to_string(), self.expired_evictions.to_string());
        metrics.insert("unhealthy_evictions".to_string(), self.unhealthy_evictions.to_string());
        metrics.insert("waits".to_string(), self.waits.to_string());
        metrics.insert("timeouts".to_string(), self.timeouts.to_string());
        metrics.insert("factory_failures".to_string(), self.factory_failures.to_string());
        metrics.insert("close_failures".to_string(), self.close_failures.to_string());
        metrics.insert("open_resources".to_string(), self.open_resources.to_string());
        metrics.insert("idle_resources".to_string(), self.idle_resources.to_string());
        metrics.insert("in_use".to_string(), self.in_use.to_string());
        metrics.insert("waiting".to_string(), self.waiting.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics.insert("max_capacity".to_string(), self.max_capacity.to_string());
        metrics
    }
}

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

#[cfg(feature = "prometheus")]
impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use respool::{PoolConfiguration, ResourcePool};
    /// use std::collections::HashMap;
    ///
    /// let config = PoolConfiguration::new()
    ///     .with_factory(|| Ok(0u32))
    ///     .with_closer(|_| Ok(()));
    /// let pool = ResourcePool::new(config).unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("db", Some(&tags)).unwrap();
    /// assert!(output.contains("respool_resources_open"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> Result<String, prometheus::Error> {
        use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};

        let mut labels = tags.cloned().unwrap_or_default();
        labels.insert("pool".to_string(), pool_name.to_string());
        let registry = Registry::new_custom(Some("respool".to_string()), Some(labels))?;

        let gauge = |name: &str, help: &str, value: usize| -> prometheus::Result<()> {
            let g = IntGauge::new(name, help)?;
            g.set(value as i64);
            registry.register(Box::new(g))
        };
        let counter = |name: &str, help: &str, value: usize| -> prometheus::Result<()> {
            let c = IntCounter::new(name, help)?;
            c.inc_by(value as u64);
            registry.register(Box::new(c))
        };

        gauge("resources_open", "Open resources", metrics.open_resources)?;
        gauge("resources_idle", "Idle resources", metrics.idle_resources)?;
        gauge("resources_in_use", "Resources held by callers", metrics.in_use)?;
        gauge("waiters", "Callers queued for a resource", metrics.waiting)?;
        gauge("max_capacity", "Hard capacity", metrics.max_capacity)?;

        let utilization = Gauge::new("utilization", "Pool utilization ratio")?;
        utilization.set(metrics.utilization);
        registry.register(Box::new(utilization))?;

        counter("acquired_total", "Successful acquires", metrics.total_acquired)?;
        counter("released_total", "Resources released", metrics.total_released)?;
        counter("created_total", "Resources created", metrics.total_created)?;
        counter("destroyed_total", "Resources destroyed", metrics.total_destroyed)?;
        counter("handoffs_total", "Direct hand-offs to waiters", metrics.handoffs)?;
        counter("evictions_expired_total", "Idle resources evicted for age", metrics.expired_evictions)?;
        counter("evictions_unhealthy_total", "Idle resources failing health checks", metrics.unhealthy_evictions)?;
        counter("waits_total", "Acquires that queued", metrics.waits)?;
        counter("timeouts_total", "Acquires that timed out", metrics.timeouts)?;
        counter("factory_failures_total", "Factory errors", metrics.factory_failures)?;
        counter("close_failures_total", "Closer errors", metrics.close_failures)?;

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    pub created: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub handoffs: AtomicUsize,
    pub expired: AtomicUsize,
    pub unhealthy: AtomicUsize,
    pub waits: AtomicUsize,
    pub timeouts: AtomicUsize,
    pub factory_failures: AtomicUsize,
    pub close_failures: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, open: usize, idle: usize, waiting: usize, capacity: usize) -> PoolMetrics {
        let in_use = open.saturating_sub(idle);
        let utilization = if capacity > 0 {
            in_use as f64 / capacity as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_acquired: self.acquired.load(Ordering::Relaxed),
            total_released: self.released.load(Ordering::Relaxed),
            total_created: self.created.load(Ordering::Relaxed),
            total_destroyed: self.destroyed.load(Ordering::Relaxed),
            handoffs: self.handoffs.load(Ordering::Relaxed),
            expired_evictions: self.expired.load(Ordering::Relaxed),
            unhealthy_evictions: self.unhealthy.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            factory_failures: self.factory_failures.load(Ordering::Relaxed),
            close_failures: self.close_failures.load(Ordering::Relaxed),
            open_resources: open,
            idle_resources: idle,
            in_use,
            waiting,
            utilization,
            max_capacity: capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_derives_usage() {
        let tracker = MetricsTracker::new();
        MetricsTracker::incr(&tracker.acquired);
        MetricsTracker::incr(&tracker.acquired);

        let metrics = tracker.get_metrics(3, 2, 0, 4);
        assert_eq!(metrics.total_acquired, 2);
        assert_eq!(metrics.in_use, 1);
        assert!((metrics.utilization - 0.25).abs() < f64::EPSILON);
        assert_eq!(metrics.export().get("utilization").map(String::as_str), Some("0.25"));
    }

    #[cfg(feature = "prometheus")]
    #[test]
    fn test_prometheus_labels() {
        let metrics = MetricsTracker::new().get_metrics(2, 2, 0, 4);
        let output = MetricsExporter::export_prometheus(&metrics, "cache", None).unwrap();

        assert!(output.contains("# TYPE respool_resources_idle gauge"));
        assert!(output.contains("respool_resources_idle{pool=\"cache\"} 2"));
        assert!(output.contains("respool_acquired_total{pool=\"cache\"} 0"));
    }
}
