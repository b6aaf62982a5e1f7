//! Process-local bus backed by std `mpsc` channels.

use std::sync::{Mutex, mpsc};

use thiserror::Error;

use crate::bus::{EventBus, Subscription};

#[derive(Debug, Error)]
pub enum InMemoryBusError {
    /// The subscriber registry lock was poisoned by a panicking thread.
    #[error("subscriber registry poisoned")]
    Poisoned,
}

/// Fan-out bus over unbounded `mpsc` channels.
///
/// Every subscriber receives its own clone of each published message.
/// A subscriber that drops its [`Subscription`] is pruned on the next
/// publish; there is no unsubscribe call.
///
/// Buffering is unbounded, so a stalled consumer grows memory rather than
/// blocking publishers. Acceptable for a single-process deployment where
/// consumers are projection workers that drain continuously.
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    subscribers: Mutex<Vec<mpsc::Sender<M>>>,
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live senders, counting ones whose receiver has already
    /// been dropped but not yet pruned.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|subs| subs.len()).unwrap_or(0)
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();

        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut subs = self
            .subscribers
            .lock()
            .map_err(|_| InMemoryBusError::Poisoned)?;

        // A failed send means the receiver is gone; prune as we go.
        subs.retain(|tx| tx.send(message.clone()).is_ok());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_sees_every_message() {
        let bus = InMemoryEventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish("first".to_string()).unwrap();
        bus.publish("second".to_string()).unwrap();

        for sub in [&a, &b] {
            assert_eq!(sub.try_recv().unwrap(), "first");
            assert_eq!(sub.try_recv().unwrap(), "second");
            assert!(sub.try_recv().is_err());
        }
    }

    #[test]
    fn dropped_subscribers_are_pruned_on_publish() {
        let bus = InMemoryEventBus::new();
        let keep = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(1_u64).unwrap();

        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(keep.try_recv().unwrap(), 1);
    }

    #[test]
    fn publish_with_no_subscribers_is_a_no_op() {
        let bus = InMemoryEventBus::<u64>::new();
        bus.publish(7).unwrap();
        assert_eq!(bus.subscriber_count(), 0);
    }
}
