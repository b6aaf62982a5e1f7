use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use stockline_core::TenantId;
use stockline_events::{EventBus, Subscription, TenantScoped};

// How long the loop sleeps in recv before re-checking the stop flag.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Owning handle for a spawned worker thread.
///
/// Dropping the handle stops the worker, so wiring code can hold it as a
/// struct field and get shutdown for free when the services are torn down.
#[derive(Debug)]
pub struct WorkerHandle {
    stop: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Stop the worker and wait for it to exit.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

/// Feeds bus messages to an idempotent handler on a dedicated thread.
pub struct ProjectionWorker;

impl ProjectionWorker {
    /// Subscribe to `bus` and run `handler` for every message, optionally
    /// restricted to a single tenant.
    ///
    /// Delivery is at-least-once, so the handler must tolerate replays. A
    /// handler error is logged and skipped; a projection that can no longer
    /// keep its state consistent is cleared and rebuilt, not resumed.
    pub fn spawn<M, B, H, E>(
        name: &'static str,
        bus: B,
        tenant_id: Option<TenantId>,
        handler: H,
    ) -> WorkerHandle
    where
        M: TenantScoped + Send + 'static,
        B: EventBus<M> + Send + Sync + 'static,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: core::fmt::Debug + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let subscription = bus.subscribe();

        let join = {
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name(name.to_string())
                .spawn(move || {
                    WorkerLoop {
                        name,
                        subscription,
                        stop,
                        tenant_id,
                        handler,
                    }
                    .run()
                })
                .expect("failed to spawn projection worker thread")
        };

        WorkerHandle {
            stop,
            join: Some(join),
        }
    }
}

struct WorkerLoop<M, H> {
    name: &'static str,
    subscription: Subscription<M>,
    stop: Arc<AtomicBool>,
    tenant_id: Option<TenantId>,
    handler: H,
}

impl<M, H, E> WorkerLoop<M, H>
where
    M: TenantScoped,
    H: FnMut(M) -> Result<(), E>,
    E: core::fmt::Debug,
{
    fn run(mut self) {
        debug!(worker = self.name, "projection worker started");

        while !self.stop.load(Ordering::Relaxed) {
            match self.subscription.recv_timeout(POLL_INTERVAL) {
                Ok(msg) => {
                    self.process(msg);
                    self.drain_pending();
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        debug!(worker = self.name, "projection worker stopped");
    }

    /// Work through everything already queued before sleeping again.
    fn drain_pending(&mut self) {
        loop {
            match self.subscription.try_recv() {
                Ok(msg) => self.process(msg),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return,
            }
        }
    }

    fn process(&mut self, msg: M) {
        if let Some(tenant) = self.tenant_id {
            if msg.tenant_id() != tenant {
                return;
            }
        }

        if let Err(err) = (self.handler)(msg) {
            warn!(worker = self.name, error = ?err, "projection worker handler failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU64;
    use std::time::Instant;

    use stockline_events::InMemoryEventBus;

    use super::*;

    #[derive(Debug, Clone)]
    struct Msg {
        tenant_id: TenantId,
        value: u64,
    }

    impl TenantScoped for Msg {
        fn tenant_id(&self) -> TenantId {
            self.tenant_id
        }
    }

    fn wait_for(seen: &AtomicU64, expected: u64) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while seen.load(Ordering::SeqCst) < expected && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn processes_messages_and_filters_tenants() {
        let bus: Arc<InMemoryEventBus<Msg>> = Arc::new(InMemoryEventBus::new());
        let tenant = TenantId::new();
        let other = TenantId::new();

        let seen = Arc::new(AtomicU64::new(0));
        let seen_in_worker = Arc::clone(&seen);

        let handle = ProjectionWorker::spawn(
            "test-worker",
            Arc::clone(&bus),
            Some(tenant),
            move |msg: Msg| {
                seen_in_worker.fetch_add(msg.value, Ordering::SeqCst);
                Ok::<(), ()>(())
            },
        );

        bus.publish(Msg {
            tenant_id: tenant,
            value: 1,
        })
        .unwrap();
        bus.publish(Msg {
            tenant_id: other,
            value: 100,
        })
        .unwrap();
        bus.publish(Msg {
            tenant_id: tenant,
            value: 2,
        })
        .unwrap();

        wait_for(&seen, 3);
        handle.shutdown();

        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn dropping_the_handle_stops_the_worker() {
        let bus: Arc<InMemoryEventBus<Msg>> = Arc::new(InMemoryEventBus::new());
        let tenant = TenantId::new();

        let seen = Arc::new(AtomicU64::new(0));
        let seen_in_worker = Arc::clone(&seen);

        let handle = ProjectionWorker::spawn(
            "drop-worker",
            Arc::clone(&bus),
            None,
            move |msg: Msg| {
                seen_in_worker.fetch_add(msg.value, Ordering::SeqCst);
                Ok::<(), ()>(())
            },
        );

        bus.publish(Msg {
            tenant_id: tenant,
            value: 1,
        })
        .unwrap();
        wait_for(&seen, 1);

        drop(handle);

        // The worker is gone; later messages are never handled.
        bus.publish(Msg {
            tenant_id: tenant,
            value: 10,
        })
        .unwrap();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
