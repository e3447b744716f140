//! Core resource pool implementation

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::RecvTimeoutError;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::config::{Closer, Factory, HealthCheck, PoolConfiguration};
use crate::errors::{PoolError, PoolResult};
use crate::eviction::{EvictionPolicy, IdleEntry};
use crate::health::HealthStatus;
use crate::metrics::{MetricsTracker, PoolMetrics};
use crate::waiters::{Delivery, WaiterQueue};

/// A checked-out resource that returns to its pool when dropped
pub struct PooledResource<T: Send + 'static> {
    resource: Option<T>,
    created_at: Instant,
    pool: Arc<Shared<T>>,
}

impl<T: Send + 'static> PooledResource<T> {
    /// When the underlying resource was created
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Take the resource out of pool management. Its capacity slot is freed
    /// and the pool will not close it.
    pub fn detach(mut self) -> T {
        let resource = self.resource.take().expect("resource already taken");
        self.pool.state.lock().free_slot();
        resource
    }
}

impl<T: Send + 'static> Deref for PooledResource<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.resource.as_ref().expect("resource already taken")
    }
}

impl<T: Send + 'static> DerefMut for PooledResource<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.resource.as_mut().expect("resource already taken")
    }
}

impl<T: Send + 'static> Drop for PooledResource<T> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take()
            && let Err(error) = self.pool.put_back(resource, self.created_at)
        {
            tracing::warn!(%error, "failed to release pooled resource");
        }
    }
}

impl<T: Send + fmt::Debug + 'static> fmt::Debug for PooledResource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledResource")
            .field("resource", &self.resource)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Everything guarded by the pool lock
struct PoolState<T> {
    open_count: usize,
    idle: VecDeque<IdleEntry<T>>,
    waiters: WaiterQueue<T>,
    closed: bool,
    factory: Option<Factory<T>>,
    health_check: Option<HealthCheck<T>>,
}

impl<T> PoolState<T> {
    /// Give up one unit of capacity. The oldest waiter inherits it so it can
    /// create a resource, otherwise the open count drops.
    fn free_slot(&mut self) {
        if self.waiters.offer(Delivery::Slot).is_some() {
            self.open_count -= 1;
        }
    }
}

/// Outcome of one pass over the pool state
enum Attempt<T, W> {
    Idle(IdleEntry<T>, Option<HealthCheck<T>>),
    Create(Factory<T>),
    Replace(IdleEntry<T>, Factory<T>),
    Wait(W),
}

struct Shared<T> {
    state: Mutex<PoolState<T>>,
    closer: Closer<T>,
    eviction: EvictionPolicy,
    max_capacity: usize,
    max_idle: usize,
    max_discards: usize,
    acquire_timeout: Option<Duration>,
    metrics: MetricsTracker,
}

impl<T: Send + 'static> Shared<T> {
    /// Pop an idle entry, reserve capacity for a new resource, or queue the
    /// caller through `register`.
    fn checkout<W>(
        &self,
        discards: usize,
        register: impl FnOnce(&mut WaiterQueue<T>) -> W,
    ) -> PoolResult<Attempt<T, W>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PoolError::PoolClosed);
        }
        let Some(factory) = state.factory.clone() else {
            return Err(PoolError::PoolClosed);
        };

        if let Some(entry) = state.idle.pop_front() {
            if discards < self.max_discards {
                return Ok(Attempt::Idle(entry, state.health_check.clone()));
            }
            return Ok(Attempt::Replace(entry, factory));
        }

        if state.open_count < self.max_capacity {
            state.open_count += 1;
            return Ok(Attempt::Create(factory));
        }

        MetricsTracker::incr(&self.metrics.waits);
        tracing::debug!(
            open = state.open_count,
            waiting = state.waiters.len() + 1,
            "pool exhausted, queueing caller"
        );
        Ok(Attempt::Wait(register(&mut state.waiters)))
    }

    /// Hand out an idle entry, or discard it when expired or unhealthy
    fn vet(
        self: &Arc<Self>,
        entry: IdleEntry<T>,
        health_check: Option<HealthCheck<T>>,
    ) -> Option<PooledResource<T>> {
        if entry.is_expired(&self.eviction) {
            MetricsTracker::incr(&self.metrics.expired);
            tracing::debug!("discarding expired idle resource");
            self.discard(entry.resource);
            return None;
        }

        if let Some(check) = health_check
            && let Err(error) = check(&entry.resource)
        {
            MetricsTracker::incr(&self.metrics.unhealthy);
            tracing::debug!(%error, "discarding unhealthy idle resource");
            self.discard(entry.resource);
            return None;
        }

        Some(self.checked_out(entry.resource, entry.created_at))
    }

    fn checked_out(self: &Arc<Self>, resource: T, created_at: Instant) -> PooledResource<T> {
        MetricsTracker::incr(&self.metrics.acquired);
        PooledResource {
            resource: Some(resource),
            created_at,
            pool: Arc::clone(self),
        }
    }

    /// Build a resource for capacity already reserved by the caller
    fn create_reserved(self: &Arc<Self>, factory: Factory<T>) -> PoolResult<PooledResource<T>> {
        match factory() {
            Ok(resource) => {
                MetricsTracker::incr(&self.metrics.created);
                let mut state = self.state.lock();
                if state.closed {
                    state.open_count -= 1;
                    drop(state);
                    tracing::debug!("pool closed during create, closing new resource");
                    self.destroy_quietly(resource);
                    return Err(PoolError::PoolClosed);
                }
                drop(state);
                tracing::debug!("created resource");
                Ok(self.checked_out(resource, Instant::now()))
            }
            Err(error) => {
                MetricsTracker::incr(&self.metrics.factory_failures);
                tracing::debug!(%error, "resource factory failed");
                self.state.lock().free_slot();
                Err(PoolError::Factory(error))
            }
        }
    }

    /// Turn what a waiter received into the caller's result
    fn accept(self: &Arc<Self>, delivery: Delivery<T>) -> PoolResult<PooledResource<T>> {
        match delivery {
            Delivery::Resource(entry) => Ok(self.checked_out(entry.resource, entry.created_at)),
            Delivery::Slot => {
                let factory = {
                    let mut state = self.state.lock();
                    match state.factory.clone() {
                        Some(factory) => factory,
                        None => {
                            state.open_count -= 1;
                            return Err(PoolError::PoolClosed);
                        }
                    }
                };
                self.create_reserved(factory)
            }
            Delivery::Closed => Err(PoolError::PoolClosed),
        }
    }

    /// Return whatever reached a waiter that went away
    fn reclaim(&self, delivery: Delivery<T>) {
        match delivery {
            Delivery::Resource(entry) => {
                if let Err(error) = self.put_back(entry.resource, entry.created_at) {
                    tracing::warn!(%error, "failed to reclaim resource from cancelled waiter");
                }
            }
            Delivery::Slot => self.state.lock().free_slot(),
            Delivery::Closed => {}
        }
    }

    /// Destroy an idle resource and free its slot
    fn discard(&self, resource: T) {
        self.destroy_quietly(resource);
        self.state.lock().free_slot();
    }

    /// Destroy a resource whose slot the caller keeps
    fn replace(&self, entry: IdleEntry<T>) {
        tracing::debug!(
            max_discards = self.max_discards,
            "discard limit reached, replacing idle resource"
        );
        self.destroy_quietly(entry.resource);
    }

    fn destroy(&self, resource: T) -> PoolResult<()> {
        MetricsTracker::incr(&self.metrics.destroyed);
        (self.closer)(resource).map_err(|error| {
            MetricsTracker::incr(&self.metrics.close_failures);
            PoolError::Close(error)
        })
    }

    fn destroy_quietly(&self, resource: T) {
        if let Err(error) = self.destroy(resource) {
            tracing::warn!(%error, "failed to close resource");
        }
    }

    /// Release path shared by `ResourcePool::release` and guard drop
    fn put_back(&self, resource: T, created_at: Instant) -> PoolResult<()> {
        MetricsTracker::incr(&self.metrics.released);
        let mut state = self.state.lock();

        if state.closed {
            state.open_count -= 1;
            drop(state);
            return self.destroy(resource);
        }

        let offered = Delivery::Resource(IdleEntry::new(resource, created_at));
        let Some(Delivery::Resource(entry)) = state.waiters.offer(offered) else {
            MetricsTracker::incr(&self.metrics.handoffs);
            tracing::trace!("handed released resource to waiter");
            return Ok(());
        };

        if state.idle.len() < self.max_idle {
            state.idle.push_back(entry);
            return Ok(());
        }

        // nobody is waiting, so the slot is simply gone
        state.open_count -= 1;
        drop(state);
        tracing::debug!(max_idle = self.max_idle, "idle store full, closing released resource");
        self.destroy(entry.resource)
    }

    /// Drop a timed-out waiter. `false` means a delivery beat the deadline.
    fn abandon_wait(&self, id: u64) -> bool {
        let removed = self.state.lock().waiters.remove(id);
        if removed {
            MetricsTracker::incr(&self.metrics.timeouts);
        }
        removed
    }

    fn deadline(timeout: Option<Duration>) -> Option<(Duration, Instant)> {
        timeout.and_then(|limit| Instant::now().checked_add(limit).map(|at| (limit, at)))
    }

    fn acquire_blocking(self: &Arc<Self>, timeout: Option<Duration>) -> PoolResult<PooledResource<T>> {
        let deadline = Self::deadline(timeout);
        let mut discards = 0;

        loop {
            match self.checkout(discards, |waiters| waiters.register_blocking())? {
                Attempt::Idle(entry, check) => match self.vet(entry, check) {
                    Some(resource) => return Ok(resource),
                    None => discards += 1,
                },
                Attempt::Create(factory) => return self.create_reserved(factory),
                Attempt::Replace(entry, factory) => {
                    self.replace(entry);
                    return self.create_reserved(factory);
                }
                Attempt::Wait((id, rx)) => {
                    let delivery = match deadline {
                        None => rx.recv().unwrap_or(Delivery::Closed),
                        Some((limit, at)) => match rx.recv_deadline(at) {
                            Ok(delivery) => delivery,
                            Err(RecvTimeoutError::Disconnected) => Delivery::Closed,
                            Err(RecvTimeoutError::Timeout) => {
                                if self.abandon_wait(id) {
                                    return Err(PoolError::Timeout(limit));
                                }
                                rx.try_recv().unwrap_or(Delivery::Closed)
                            }
                        },
                    };
                    return self.accept(delivery);
                }
            }
        }
    }

    async fn acquire_async(self: &Arc<Self>, timeout: Option<Duration>) -> PoolResult<PooledResource<T>> {
        let deadline = Self::deadline(timeout);
        let mut discards = 0;

        loop {
            match self.checkout(discards, |waiters| waiters.register_async())? {
                Attempt::Idle(entry, check) => match self.vet(entry, check) {
                    Some(resource) => return Ok(resource),
                    None => discards += 1,
                },
                Attempt::Create(factory) => return self.create_reserved(factory),
                Attempt::Replace(entry, factory) => {
                    self.replace(entry);
                    return self.create_reserved(factory);
                }
                Attempt::Wait((id, rx)) => {
                    let mut wait = PendingWait {
                        pool: self,
                        id,
                        rx,
                        armed: true,
                    };
                    let received = match deadline {
                        None => (&mut wait.rx).await.ok(),
                        Some((limit, at)) => {
                            let at = tokio::time::Instant::from_std(at);
                            let outcome = tokio::time::timeout_at(at, &mut wait.rx).await;
                            match outcome {
                                Ok(result) => result.ok(),
                                Err(_) => {
                                    wait.armed = false;
                                    if self.abandon_wait(id) {
                                        return Err(PoolError::Timeout(limit));
                                    }
                                    wait.rx.try_recv().ok()
                                }
                            }
                        }
                    };
                    wait.armed = false;
                    return self.accept(received.unwrap_or(Delivery::Closed));
                }
            }
        }
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        let idle = std::mem::take(&mut self.state.get_mut().idle);
        for entry in idle {
            if let Err(error) = (self.closer)(entry.resource) {
                tracing::warn!(%error, "failed to close idle resource on pool drop");
            }
        }
    }
}

/// Keeps an async waiter registered until it resolves. Dropping it early
/// (the acquire future was cancelled) deregisters the waiter and gives back
/// anything that was already delivered.
struct PendingWait<'a, T: Send + 'static> {
    pool: &'a Arc<Shared<T>>,
    id: u64,
    rx: oneshot::Receiver<Delivery<T>>,
    armed: bool,
}

impl<T: Send + 'static> Drop for PendingWait<'_, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if self.pool.state.lock().waiters.remove(self.id) {
            return;
        }
        if let Ok(delivery) = self.rx.try_recv() {
            self.pool.reclaim(delivery);
        }
    }
}

/// Bounded pool of expensive, reusable resources
///
/// # Examples
///
/// ```
/// use respool::{PoolConfiguration, ResourcePool};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
///
/// let next = Arc::new(AtomicU32::new(0));
/// let config = PoolConfiguration::new()
///     .with_initial_capacity(1)
///     .with_max_idle(2)
///     .with_max_capacity(4)
///     .with_factory(move || Ok(next.fetch_add(1, Ordering::SeqCst)))
///     .with_closer(|_| Ok(()));
///
/// let pool = ResourcePool::new(config).unwrap();
/// {
///     let conn = pool.acquire().unwrap();
///     assert_eq!(*conn, 0);
/// }
/// assert_eq!(pool.len(), 1);
///
/// pool.shutdown();
/// assert!(pool.acquire().is_err());
/// ```
pub struct ResourcePool<T: Send + 'static> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> Clone for ResourcePool<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static> fmt::Debug for ResourcePool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("ResourcePool")
            .field("open", &state.open_count)
            .field("idle", &state.idle.len())
            .field("waiting", &state.waiters.len())
            .field("max_capacity", &self.shared.max_capacity)
            .field("closed", &state.closed)
            .finish()
    }
}

impl<T: Send + 'static> ResourcePool<T> {
    /// Validate the configuration and eagerly create `initial_capacity`
    /// resources. If any of them fails, the ones already built are closed.
    pub fn new(config: PoolConfiguration<T>) -> PoolResult<Self> {
        config.validate()?;
        let eviction = config.eviction_policy();

        let PoolConfiguration {
            initial_capacity,
            max_capacity,
            max_idle,
            acquire_timeout,
            max_discards_per_acquire,
            factory,
            closer,
            health_check,
            ..
        } = config;
        let (Some(factory), Some(closer)) = (factory, closer) else {
            return Err(PoolError::invalid_config("factory and closer are required"));
        };

        let metrics = MetricsTracker::new();
        let mut idle = VecDeque::with_capacity(max_idle);
        for _ in 0..initial_capacity {
            match factory() {
                Ok(resource) => {
                    MetricsTracker::incr(&metrics.created);
                    idle.push_back(IdleEntry::new(resource, Instant::now()));
                }
                Err(error) => {
                    tracing::warn!(%error, created = idle.len(), "factory failed while filling pool");
                    for entry in idle {
                        if let Err(error) = closer(entry.resource) {
                            tracing::warn!(%error, "failed to close resource after aborted start");
                        }
                    }
                    return Err(PoolError::Factory(error));
                }
            }
        }

        tracing::debug!(initial_capacity, max_idle, max_capacity, "resource pool ready");

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PoolState {
                    open_count: initial_capacity,
                    idle,
                    waiters: WaiterQueue::new(),
                    closed: false,
                    factory: Some(factory),
                    health_check,
                }),
                closer,
                eviction,
                max_capacity,
                max_idle,
                max_discards: max_discards_per_acquire,
                acquire_timeout,
                metrics,
            }),
        })
    }

    /// Get a resource, blocking the thread while the pool is at capacity.
    /// Waits at most the configured `acquire_timeout`.
    pub fn acquire(&self) -> PoolResult<PooledResource<T>> {
        self.shared.acquire_blocking(self.shared.acquire_timeout)
    }

    /// Get a resource, blocking at most `timeout`
    pub fn acquire_timeout(&self, timeout: Duration) -> PoolResult<PooledResource<T>> {
        self.shared.acquire_blocking(Some(timeout))
    }

    /// Get a resource only if one is available without waiting.
    ///
    /// Every failure maps to `None`: a busy pool, a closed pool and a factory
    /// error look the same. Use `acquire_timeout(Duration::ZERO)` to tell
    /// them apart.
    pub fn try_acquire(&self) -> Option<PooledResource<T>> {
        self.acquire_timeout(Duration::ZERO).ok()
    }

    /// Get a resource asynchronously. Waits at most the configured
    /// `acquire_timeout`; dropping the future gives up the place in the queue.
    ///
    /// The factory, closer and health check are synchronous and run on the
    /// executor thread, here and when a guard is dropped inside a task. Keep
    /// them short or they stall other tasks on that worker.
    pub async fn acquire_async(&self) -> PoolResult<PooledResource<T>> {
        self.shared.acquire_async(self.shared.acquire_timeout).await
    }

    /// Get a resource asynchronously, waiting at most `timeout`
    pub async fn acquire_async_timeout(&self, timeout: Duration) -> PoolResult<PooledResource<T>> {
        self.shared.acquire_async(Some(timeout)).await
    }

    /// Return a resource explicitly, surfacing close errors that a plain drop
    /// would only log
    pub fn release(&self, mut resource: PooledResource<T>) -> PoolResult<()> {
        if !Arc::ptr_eq(&self.shared, &resource.pool) {
            return Err(PoolError::InvalidResource);
        }
        match resource.resource.take() {
            Some(inner) => self.shared.put_back(inner, resource.created_at),
            None => Err(PoolError::InvalidResource),
        }
    }

    /// Close the pool: idle resources are destroyed, queued callers fail with
    /// `PoolClosed`. Resources still checked out are destroyed on release.
    pub fn shutdown(&self) {
        let (idle, waiters) = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.factory = None;
            state.health_check = None;
            let idle = std::mem::take(&mut state.idle);
            state.open_count -= idle.len();
            (idle, state.waiters.drain())
        };

        tracing::info!(idle = idle.len(), waiters = waiters.len(), "shutting down resource pool");

        for waiter in waiters {
            let _ = waiter.notify(Delivery::Closed);
        }
        for entry in idle {
            self.shared.destroy_quietly(entry.resource);
        }
    }

    /// Idle resources right now. A hint, not a reservation.
    pub fn len(&self) -> usize {
        self.shared.state.lock().idle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open resources, idle or checked out
    pub fn open_count(&self) -> usize {
        self.shared.state.lock().open_count
    }

    /// Callers queued for a resource
    pub fn waiting(&self) -> usize {
        self.shared.state.lock().waiters.len()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        let (open, idle, waiting) = {
            let state = self.shared.state.lock();
            (state.open_count, state.idle.len(), state.waiters.len())
        };
        self.shared
            .metrics
            .get_metrics(open, idle, waiting, self.shared.max_capacity)
    }

    /// Get health status
    pub fn get_health_status(&self) -> HealthStatus {
        let state = self.shared.state.lock();
        HealthStatus::new(
            state.open_count,
            state.idle.len(),
            state.waiters.len(),
            self.shared.max_capacity,
            state.closed,
        )
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    #[cfg(feature = "prometheus")]
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> Result<String, prometheus::Error> {
        crate::metrics::MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }
}
