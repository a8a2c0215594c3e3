use std::future::Future;
use std::sync::Mutex;
use std::sync::MutexGuard;
use tokio::sync::broadcast;

/// Coordinates callers so at most one instance of an operation is in flight
/// at a time. The first caller becomes the leader and actually runs the
/// operation; callers arriving while it is pending subscribe to the leader's
/// outcome instead of starting a second run.
///
/// The in-flight marker is owned by this struct rather than living in a
/// process-wide flag, and it is cleared through a drop guard on every exit
/// path, so a cancelled or panicked leader cannot wedge later callers.
#[derive(Debug)]
pub struct SingleFlight<T> {
    inflight: Mutex<Option<broadcast::Sender<T>>>,
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(None),
        }
    }

    /// Runs `op` exclusively and returns its value to every caller that
    /// attached while it was pending. `abandoned` supplies the value handed
    /// to waiters whose leader went away without publishing a result.
    pub async fn run<F, Fut, A>(&self, op: F, abandoned: A) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
        A: FnOnce() -> T,
    {
        let waiter = {
            let mut inflight = lock_ignoring_poison(&self.inflight);
            match &*inflight {
                Some(tx) => Some(tx.subscribe()),
                None => {
                    let (tx, _) = broadcast::channel(1);
                    *inflight = Some(tx);
                    None
                }
            }
        };

        if let Some(mut rx) = waiter {
            return match rx.recv().await {
                Ok(value) => value,
                Err(_) => abandoned(),
            };
        }

        let guard = ClearOnDrop {
            inflight: &self.inflight,
        };
        let value = op().await;
        if let Some(tx) = guard.release() {
            // Send only fails when every waiter already hung up.
            let _ = tx.send(value.clone());
        }
        value
    }
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Clears the in-flight slot when the leader finishes or is dropped
/// mid-operation. Dropping the sender without publishing wakes waiters with
/// a closed-channel error, which they surface through `abandoned`.
struct ClearOnDrop<'a, T> {
    inflight: &'a Mutex<Option<broadcast::Sender<T>>>,
}

impl<T> ClearOnDrop<'_, T> {
    fn release(self) -> Option<broadcast::Sender<T>> {
        let taken = lock_ignoring_poison(self.inflight).take();
        std::mem::forget(self);
        taken
    }
}

impl<T> Drop for ClearOnDrop<'_, T> {
    fn drop(&mut self) {
        lock_ignoring_poison(self.inflight).take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_callers_share_one_execution() {
        let flight = Arc::new(SingleFlight::<usize>::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flight = Arc::clone(&flight);
            let runs = Arc::clone(&runs);
            handles.push(tokio::spawn(async move {
                flight
                    .run(
                        || async move {
                            tokio::time::sleep(Duration::from_millis(200)).await;
                            runs.fetch_add(1, Ordering::SeqCst) + 1
                        },
                        || 0,
                    )
                    .await
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap_or(0));
        }

        assert_eq!(1, runs.load(Ordering::SeqCst));
        assert!(results.iter().all(|value| *value == 1));
    }

    #[tokio::test]
    async fn next_run_starts_fresh_after_previous_settles() {
        let flight = SingleFlight::<u32>::new();
        let first = flight.run(|| async { 1 }, || 0).await;
        let second = flight.run(|| async { 2 }, || 0).await;
        assert_eq!((1, 2), (first, second));
    }

    #[tokio::test]
    async fn cancelled_leader_does_not_wedge_the_slot() {
        let flight = Arc::new(SingleFlight::<u32>::new());

        let leader = {
            let flight = Arc::clone(&flight);
            tokio::spawn(async move {
                flight
                    .run(
                        || async {
                            tokio::time::sleep(Duration::from_secs(60)).await;
                            1
                        },
                        || 0,
                    )
                    .await
            })
        };
        // Give the leader time to claim the slot, then cancel it.
        tokio::time::sleep(Duration::from_millis(20)).await;
        leader.abort();
        let _ = leader.await;

        let value = flight.run(|| async { 2 }, || 0).await;
        assert_eq!(2, value);
    }
}
