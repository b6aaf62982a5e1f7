//! Pub/sub seam between the event store and its consumers.
//!
//! Persistence always happens before publication: an append that commits but
//! fails to publish leaves the store as the source of truth, and the events
//! can be replayed to consumers later. Consumers therefore get an
//! at-least-once contract and must apply messages idempotently.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// Broadcast publisher. Implementations fan each message out to every
/// live subscription.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

// Shared buses are passed around as Arc<B>; delegate so callers don't
// need to deref explicitly.
impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}

/// Receiving end of one bus subscription.
///
/// Owns a private channel; meant to be drained by a single consumer thread.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Wait for the next message, blocking indefinitely.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Wait for the next message, giving up after `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Take a pending message if one is queued, without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }
}
