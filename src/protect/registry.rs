//! In-flight registry: one live execution per coalescing key.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared, WeakShared};
use tracing::{debug, trace};

use super::key::CoalescingKey;
use crate::Error;

type SharedRun<T> = Shared<BoxFuture<'static, Result<T, Error>>>;
type WeakRun<T> = WeakShared<BoxFuture<'static, Result<T, Error>>>;

struct InFlight {
    id: u64,
    handle: Box<dyn Any + Send + Sync>,
}

/// Map from coalescing key to the pending execution for that key.
///
/// Only weak handles are stored: the execution lives as long as at least one
/// caller awaits it. The entry is removed when the execution settles or is
/// dropped, before any waiter observes the outcome, so a call that starts
/// after settlement always runs afresh.
#[derive(Default)]
pub struct InFlightRegistry {
    entries: DashMap<CoalescingKey, InFlight>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for InFlightRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightRegistry")
            .field("in_flight", &self.entries.len())
            .finish()
    }
}

impl InFlightRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of executions currently registered.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when an execution is registered under `key`.
    #[must_use]
    pub fn contains(&self, key: &CoalescingKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Joins the execution registered under `key`, or starts `make()` and
    /// registers it.
    ///
    /// Every caller sharing an execution receives a clone of its outcome,
    /// success or failure.
    ///
    /// # Errors
    ///
    /// Returns whatever error the shared execution produced.
    pub async fn run<T, F, Fut>(self: &Arc<Self>, key: CoalescingKey, make: F) -> Result<T, Error>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
    {
        let run = self.join_or_start(key, make);
        run.await
    }

    fn join_or_start<T, F, Fut>(self: &Arc<Self>, key: CoalescingKey, make: F) -> SharedRun<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
    {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let live = occupied
                    .get()
                    .handle
                    .downcast_ref::<WeakRun<T>>()
                    .and_then(WeakShared::upgrade);
                if let Some(run) = live {
                    debug!(%key, "joined in-flight call");
                    return run;
                }
                trace!(%key, "replacing stale in-flight entry");
                let (entry, run) = self.launch(key, make);
                if let Some(entry) = entry {
                    occupied.insert(entry);
                } else {
                    occupied.remove();
                }
                run
            }
            Entry::Vacant(vacant) => {
                debug!(%key, "starting call");
                let (entry, run) = self.launch(key, make);
                if let Some(entry) = entry {
                    vacant.insert(entry);
                }
                run
            }
        }
    }

    fn launch<T, F, Fut>(self: &Arc<Self>, key: CoalescingKey, make: F) -> (Option<InFlight>, SharedRun<T>)
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let guard = Deregister {
            registry: Arc::clone(self),
            key,
            id,
        };
        let operation = make();
        let run = async move {
            let _guard = guard;
            operation.await
        }
        .boxed()
        .shared();
        let entry = run.downgrade().map(|weak| InFlight {
            id,
            handle: Box::new(weak),
        });
        (entry, run)
    }
}

/// Removes its registry entry when the execution finishes or is dropped.
struct Deregister {
    registry: Arc<InFlightRegistry>,
    key: CoalescingKey,
    id: u64,
}

impl Drop for Deregister {
    fn drop(&mut self) {
        let removed = self
            .registry
            .entries
            .remove_if(&self.key, |_, entry| entry.id == self.id);
        if removed.is_some() {
            trace!(key = %self.key, "in-flight call settled");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;
    use crate::transport::FetchError;

    fn counted(
        calls: &Arc<AtomicUsize>,
        outcome: Result<u32, Error>,
    ) -> impl Future<Output = Result<u32, Error>> + Send + 'static {
        let calls = Arc::clone(calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            outcome
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_equal_keys_share_one_execution() {
        let registry = Arc::new(InFlightRegistry::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let key = CoalescingKey::new("announcements");

        let (a, b) = tokio::join!(
            registry.run(key.clone(), || counted(&calls, Ok(1))),
            registry.run(key.clone(), || counted(&calls, Ok(2))),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 1);
        assert_eq!(registry.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_keys_run_independently() {
        let registry = Arc::new(InFlightRegistry::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            registry.run(CoalescingKey::new("assignment").arg(1_i64), || counted(&calls, Ok(1))),
            registry.run(CoalescingKey::new("assignment").arg(2_i64), || counted(&calls, Ok(2))),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!((a.unwrap(), b.unwrap()), (1, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_shared_with_every_waiter() {
        let registry = Arc::new(InFlightRegistry::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let key = CoalescingKey::new("diary");
        let failure = || Err(Error::Fetch(FetchError::invalid_url("bad")));

        let (a, b) = tokio::join!(
            registry.run(key.clone(), || counted(&calls, failure())),
            registry.run(key.clone(), || counted(&calls, failure())),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap_err().to_string(), b.unwrap_err().to_string());
        assert!(!registry.contains(&key));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_calls_run_afresh() {
        let registry = Arc::new(InFlightRegistry::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let key = CoalescingKey::new("announcements");

        registry.run(key.clone(), || counted(&calls, Ok(1))).await.unwrap();
        registry.run(key.clone(), || counted(&calls, Ok(1))).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_execution_deregisters() {
        let registry = Arc::new(InFlightRegistry::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let key = CoalescingKey::new("journal");

        let pending = tokio::time::timeout(
            Duration::from_millis(10),
            registry.run(key.clone(), || counted(&calls, Ok(1))),
        )
        .await;
        assert!(pending.is_err());
        assert!(!registry.contains(&key));

        registry.run(key.clone(), || counted(&calls, Ok(2))).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
