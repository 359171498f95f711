//! Single-flight coordination for refreshes.
//!
//! The slot holds either nothing or the shared handle of the one operation in
//! progress. Callers that arrive while an operation is pending subscribe to
//! it instead of starting their own. The operation runs on its own Tokio task,
//! so it completes (and clears the slot) even if every caller gives up.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};

/// Shared handle to a pending operation; resolves to `None` if the task panicked.
pub(crate) type Pending<T> = Shared<BoxFuture<'static, Option<T>>>;

type Slot<T> = Arc<Mutex<Option<Pending<T>>>>;

pub(crate) struct SingleFlight<T> {
    slot: Slot<T>,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Joins the pending operation, or starts `start()` if none is pending.
    ///
    /// Returns the shared handle and whether this call started the operation.
    /// Must be called from within a Tokio runtime.
    pub(crate) fn join_or_start<F, Fut>(&self, start: F) -> (Pending<T>, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut slot = lock(&self.slot);
        if let Some(pending) = slot.as_ref() {
            return (pending.clone(), false);
        }

        let operation = start();
        let release = SlotRelease {
            slot: Arc::clone(&self.slot),
        };
        let task = tokio::spawn(async move {
            // Cleared on completion and on panic alike.
            let _release = release;
            operation.await
        });
        let pending = async move { task.await.ok() }.boxed().shared();
        *slot = Some(pending.clone());
        (pending, true)
    }

    /// Returns whether an operation is currently pending.
    #[cfg(test)]
    pub(crate) fn is_pending(&self) -> bool {
        lock(&self.slot).is_some()
    }
}

/// Empties the slot when the owning task finishes.
struct SlotRelease<T> {
    slot: Slot<T>,
}

impl<T> Drop for SlotRelease<T> {
    fn drop(&mut self) {
        lock(&self.slot).take();
    }
}

fn lock<T>(slot: &Mutex<Option<T>>) -> MutexGuard<'_, Option<T>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Concurrent callers share one execution and observe the same value.
    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_callers_share_one_execution() {
        let flight = Arc::new(SingleFlight::<Arc<String>>::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let mut callers = Vec::new();
        for _ in 0..8 {
            let flight = Arc::clone(&flight);
            let runs = Arc::clone(&runs);
            callers.push(tokio::spawn(async move {
                let (pending, _) = flight.join_or_start(move || async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Arc::new("value".to_string())
                });
                pending.await
            }));
        }

        let mut results = Vec::new();
        for caller in callers {
            results.push(caller.await.unwrap().unwrap());
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
        assert!(!flight.is_pending());
    }

    #[tokio::test]
    async fn sequential_calls_run_separately() {
        let flight = SingleFlight::<usize>::new();
        let runs = Arc::new(AtomicUsize::new(0));

        for expected in 1..=2 {
            let counter = Arc::clone(&runs);
            let (pending, started) = flight.join_or_start(move || async move {
                counter.fetch_add(1, Ordering::SeqCst) + 1
            });
            assert!(started);
            assert_eq!(pending.await, Some(expected));
        }
    }

    /// The operation completes and clears the slot even when its caller is gone.
    #[tokio::test]
    async fn dropped_caller_does_not_cancel_operation() {
        let flight = SingleFlight::<usize>::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let (pending, _) = flight.join_or_start(move || async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            counter.fetch_add(1, Ordering::SeqCst)
        });
        drop(pending);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!flight.is_pending());
    }

    #[tokio::test]
    async fn panicking_operation_resolves_to_none() {
        let flight = SingleFlight::<usize>::new();
        let (pending, _) = flight.join_or_start(|| async {
            if true {
                panic!("fetch blew up");
            }
            0
        });
        assert_eq!(pending.await, None);
        assert!(!flight.is_pending());
    }
}
