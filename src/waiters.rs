//! FIFO queue of callers blocked in `acquire`

use std::collections::VecDeque;

use crossbeam::channel;
use tokio::sync::oneshot;

use crate::eviction::IdleEntry;

/// What a queued caller receives
pub(crate) enum Delivery<T> {
    /// A released resource handed over directly
    Resource(IdleEntry<T>),
    /// Capacity reserved for the waiter, it creates its own resource
    Slot,
    /// The pool was shut down
    Closed,
}

enum Notifier<T> {
    Blocking(channel::Sender<Delivery<T>>),
    Async(oneshot::Sender<Delivery<T>>),
}

pub(crate) struct Waiter<T> {
    id: u64,
    notifier: Notifier<T>,
}

impl<T> Waiter<T> {
    /// Deliver to the waiting caller, giving the delivery back if the caller is gone
    pub fn notify(self, delivery: Delivery<T>) -> Result<(), Delivery<T>> {
        match self.notifier {
            Notifier::Blocking(tx) => tx.send(delivery).map_err(|e| e.into_inner()),
            Notifier::Async(tx) => tx.send(delivery),
        }
    }
}

/// Waiters in arrival order. Lives inside the pool state and is only
/// touched under the pool lock.
pub(crate) struct WaiterQueue<T> {
    queue: VecDeque<Waiter<T>>,
    next_id: u64,
}

impl<T> WaiterQueue<T> {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            next_id: 0,
        }
    }

    fn push(&mut self, notifier: Notifier<T>) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.queue.push_back(Waiter { id, notifier });
        id
    }

    /// Queue a thread that will block on the returned receiver
    pub fn register_blocking(&mut self) -> (u64, channel::Receiver<Delivery<T>>) {
        let (tx, rx) = channel::bounded(1);
        (self.push(Notifier::Blocking(tx)), rx)
    }

    /// Queue a task that will await the returned receiver
    pub fn register_async(&mut self) -> (u64, oneshot::Receiver<Delivery<T>>) {
        let (tx, rx) = oneshot::channel();
        (self.push(Notifier::Async(tx)), rx)
    }

    /// Offer a delivery to the oldest live waiter. Waiters whose caller has
    /// gone away are skipped. Returns the delivery if nobody took it.
    pub fn offer(&mut self, mut delivery: Delivery<T>) -> Option<Delivery<T>> {
        while let Some(waiter) = self.queue.pop_front() {
            let id = waiter.id;
            match waiter.notify(delivery) {
                Ok(()) => {
                    tracing::trace!(waiter = id, "delivered to waiter");
                    return None;
                }
                Err(returned) => delivery = returned,
            }
        }
        Some(delivery)
    }

    /// Remove a waiter that gave up. `false` means it was already served.
    pub fn remove(&mut self, id: u64) -> bool {
        match self.queue.iter().position(|w| w.id == id) {
            Some(pos) => {
                self.queue.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn drain(&mut self) -> Vec<Waiter<T>> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}
