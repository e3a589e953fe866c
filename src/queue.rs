//! Bounded-concurrency task queue.
//!
//! Tasks start in submission order as slots free up; at most `concurrency`
//! run at once. Each caller gets a [`TaskHandle`] resolving to exactly its
//! own task's outcome. A failing or panicking task frees its slot like any
//! other and never stalls the queue.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::{Result, SearchError};

/// Interval at which [`TaskQueue::wait_all`] re-checks for idleness.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

type Job<T> = BoxFuture<'static, Result<T>>;

/// A queued task and the channel its caller is waiting on.
struct Entry<T> {
    job: Job<T>,
    tx: oneshot::Sender<Result<T>>,
}

struct State<T> {
    pending: VecDeque<Entry<T>>,
    running: usize,
    results: Vec<T>,
}

struct Inner<T> {
    concurrency: usize,
    state: Mutex<State<T>>,
}

impl<T: Clone + Send + 'static> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts queued jobs until the concurrency limit is reached.
    fn pump(self: &Arc<Self>) {
        loop {
            let Entry { job, tx } = {
                let mut state = self.lock();
                if state.running >= self.concurrency {
                    return;
                }
                match state.pending.pop_front() {
                    Some(entry) => {
                        state.running += 1;
                        entry
                    }
                    None => return,
                }
            };

            let inner = Arc::clone(self);
            tokio::spawn(async move {
                let outcome = AssertUnwindSafe(job).catch_unwind().await;

                // Bookkeeping settles before the caller is woken.
                {
                    let mut state = inner.lock();
                    state.running -= 1;
                    if let Ok(Ok(value)) = &outcome {
                        state.results.push(value.clone());
                    }
                }

                match outcome {
                    Ok(outcome) => {
                        if let Err(e) = &outcome {
                            debug!("Queued task failed: {}", e);
                        }
                        let _ = tx.send(outcome);
                    }
                    Err(_) => warn!("Queued task panicked"),
                }
                inner.pump();
            });
        }
    }
}

/// A cloneable handle to a bounded-concurrency task queue.
///
/// Requires a Tokio runtime: tasks are spawned onto it.
pub struct TaskQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for TaskQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> TaskQueue<T> {
    /// Creates a queue running at most `concurrency` tasks at once (minimum 1).
    pub fn new(concurrency: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                concurrency: concurrency.max(1),
                state: Mutex::new(State {
                    pending: VecDeque::new(),
                    running: 0,
                    results: Vec::new(),
                }),
            }),
        }
    }

    /// Maximum number of concurrently running tasks.
    pub fn concurrency(&self) -> usize {
        self.inner.concurrency
    }

    /// Enqueues a task and starts it at once if a slot is free.
    ///
    /// Dropping the returned handle does not cancel the task.
    pub fn add<F>(&self, task: F) -> TaskHandle<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let entry = Entry {
            job: Box::pin(task),
            tx,
        };

        self.inner.lock().pending.push_back(entry);
        self.inner.pump();

        TaskHandle { rx }
    }

    /// Number of tasks currently running.
    pub fn running(&self) -> usize {
        self.inner.lock().running
    }

    /// Number of tasks waiting for a slot.
    pub fn pending(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Waits until nothing is running or queued, then returns every
    /// successful result collected so far, in completion order.
    pub async fn wait_all(&self) -> Vec<T> {
        loop {
            {
                let state = self.inner.lock();
                if state.running == 0 && state.pending.is_empty() {
                    return state.results.clone();
                }
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }
}

/// Resolves to the outcome of one queued task.
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(SearchError::Other(
                "queued task ended without a result".to_string(),
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_pending, assert_ready_ok, task};

    #[tokio::test]
    async fn test_queue_new_minimum_concurrency() {
        let queue: TaskQueue<u32> = TaskQueue::new(0);
        assert_eq!(queue.concurrency(), 1);
        assert_eq!(queue.running(), 0);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_queue_never_exceeds_concurrency() {
        let queue = TaskQueue::new(3);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..12)
            .map(|i| {
                let current = Arc::clone(&current);
                let peak = Arc::clone(&peak);
                queue.add(async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok(i)
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(queue.running(), 0);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_queue_delivers_each_result_to_its_caller() {
        let queue = TaskQueue::new(4);
        let handles: Vec<_> = (0..10u64)
            .map(|i| {
                queue.add(async move {
                    // Later submissions finish first.
                    tokio::time::sleep(Duration::from_millis(50 - i * 5)).await;
                    if i % 3 == 0 {
                        Err(SearchError::Other(format!("task {} failed", i)))
                    } else {
                        Ok(i)
                    }
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let i = i as u64;
            match handle.await {
                Ok(value) => {
                    assert_ne!(i % 3, 0);
                    assert_eq!(value, i);
                }
                Err(e) => {
                    assert_eq!(i % 3, 0);
                    assert_eq!(e.to_string(), format!("task {} failed", i));
                }
            }
        }
    }

    #[tokio::test]
    async fn test_handle_pending_until_task_finishes() {
        let queue = TaskQueue::new(1);
        let (release, released) = oneshot::channel::<()>();
        let mut handle = task::spawn(queue.add(async move {
            let _ = released.await;
            Ok(5u32)
        }));
        let mut queued = task::spawn(queue.add(async { Ok(6u32) }));

        assert_pending!(handle.poll());
        assert_pending!(queued.poll());
        assert_eq!(queue.pending(), 1);

        release.send(()).unwrap();
        while !handle.is_woken() {
            tokio::task::yield_now().await;
        }
        assert_eq!(assert_ready_ok!(handle.poll()), 5);

        while !queued.is_woken() {
            tokio::task::yield_now().await;
        }
        assert_eq!(assert_ready_ok!(queued.poll()), 6);
    }

    #[tokio::test]
    async fn test_queue_starts_in_fifo_order() {
        let queue = TaskQueue::new(1);
        let started = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..5)
            .map(|i| {
                let started = Arc::clone(&started);
                queue.add(async move {
                    started.lock().unwrap().push(i);
                    tokio::task::yield_now().await;
                    Ok(i)
                })
            })
            .collect();
        assert_eq!(queue.pending(), 4);

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*started.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_queue_failure_does_not_stall() {
        let queue = TaskQueue::new(1);
        let first = queue.add(async { Err::<u32, _>(SearchError::Timeout("page".to_string())) });
        let second = queue.add(async { Ok(7u32) });

        assert!(matches!(first.await, Err(SearchError::Timeout(_))));
        assert_eq!(second.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_queue_panic_frees_slot() {
        let queue = TaskQueue::new(1);
        let panicking = queue.add(async {
            if true {
                panic!("boom");
            }
            Ok(0u32)
        });
        let next = queue.add(async { Ok(1u32) });

        assert!(panicking.await.is_err());
        assert_eq!(next.await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_queue_settles_before_handle_resolves() {
        for _ in 0..20 {
            let queue = TaskQueue::new(2);
            let first = queue.add(async { Ok(1u32) });
            let second = queue.add(async {
                tokio::task::yield_now().await;
                Ok(2u32)
            });

            assert_eq!(first.await.unwrap(), 1);
            assert_eq!(second.await.unwrap(), 2);
            assert_eq!(queue.running(), 0);
            let mut results = queue.wait_all().await;
            results.sort_unstable();
            assert_eq!(results, vec![1, 2]);
        }
    }

    #[tokio::test]
    async fn test_wait_all_collects_successes() {
        let queue = TaskQueue::new(2);
        for i in 0..6u32 {
            // Handles dropped on purpose: tasks still run.
            let _ = queue.add(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                if i == 2 {
                    Err(SearchError::Other("skip".to_string()))
                } else {
                    Ok(i)
                }
            });
        }

        let mut results = queue.wait_all().await;
        results.sort_unstable();
        assert_eq!(results, vec![0, 1, 3, 4, 5]);
        assert_eq!(queue.running(), 0);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_wait_all_empty_queue() {
        let queue: TaskQueue<u32> = TaskQueue::new(2);
        assert!(queue.wait_all().await.is_empty());
    }
}
