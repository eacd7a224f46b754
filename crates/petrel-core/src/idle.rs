//! Idle task executor.
//!
//! Persistence writes, full-text indexing, and batch inserts ride this
//! executor so they never compete with input latency or animation. Tasks
//! run FIFO in bounded slots: once a slot's work-time ceiling is hit the
//! remainder is rescheduled. A failing task is logged and dropped; it
//! cannot block the tasks behind it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tokio::sync::{watch, Notify};
use tokio::time::Instant;

use crate::config::IdleConfig;

type IdleTask = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

struct Inner {
    config: IdleConfig,
    tasks: Mutex<VecDeque<(u64, IdleTask)>>,
    wake: Notify,
    /// Queued plus in-flight task count, observable for quiescence.
    pending_tx: watch::Sender<usize>,
    pending_rx: watch::Receiver<usize>,
}

/// Cloneable handle to the executor; the runner is a background task
/// spawned at construction.
#[derive(Clone)]
pub struct IdleExecutor {
    inner: Arc<Inner>,
    next_id: Arc<Mutex<u64>>,
}

impl IdleExecutor {
    pub fn new(config: IdleConfig) -> Self {
        let (pending_tx, pending_rx) = watch::channel(0usize);
        let inner = Arc::new(Inner {
            config,
            tasks: Mutex::new(VecDeque::new()),
            wake: Notify::new(),
            pending_tx,
            pending_rx,
        });

        tokio::spawn(run(Arc::clone(&inner)));

        Self {
            inner,
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    /// Schedule a task for a later idle slot. The closure is never
    /// invoked synchronously with this call.
    pub fn add_task<F, Fut>(&self, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let id = {
            let mut next = self.next_id.lock().expect("id mutex poisoned");
            let id = *next;
            *next += 1;
            id
        };

        {
            let mut tasks = self.inner.tasks.lock().expect("task mutex poisoned");
            tasks.push_back((id, Box::new(move || Box::pin(task()))));
        }
        self.inner.pending_tx.send_modify(|n| *n += 1);
        self.inner.wake.notify_one();
    }

    /// Number of tasks queued or running.
    pub fn pending(&self) -> usize {
        *self.inner.pending_rx.borrow()
    }

    /// Wait until every scheduled task has finished. Used by hosts that
    /// flush on shutdown and by tests that need determinism.
    pub async fn wait_until_idle(&self) {
        let mut rx = self.inner.pending_rx.clone();
        loop {
            if *rx.borrow_and_update() == 0 {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

async fn run(inner: Arc<Inner>) {
    loop {
        let has_work = {
            let tasks = inner.tasks.lock().expect("task mutex poisoned");
            !tasks.is_empty()
        };
        if !has_work {
            inner.wake.notified().await;
            continue;
        }

        // One idle slot: run tasks until the ceiling is hit or the
        // queue empties, then yield the thread.
        let slot_started = Instant::now();
        let ceiling = inner.config.max_work_time();

        while slot_started.elapsed() < ceiling {
            let next = {
                let mut tasks = inner.tasks.lock().expect("task mutex poisoned");
                tasks.pop_front()
            };
            let Some((id, task)) = next else {
                break;
            };

            if let Err(err) = task().await {
                tracing::warn!(task = id, error = %err, "idle task failed; not retried");
            }
            inner.pending_tx.send_modify(|n| *n = n.saturating_sub(1));
        }

        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn runs_tasks_in_fifo_order() {
        let executor = IdleExecutor::new(IdleConfig::default());
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let log = Arc::clone(&log);
            executor.add_task(move || async move {
                log.lock().unwrap().push(i);
                Ok(())
            });
        }

        executor.wait_until_idle().await;
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn never_runs_synchronously() {
        let executor = IdleExecutor::new(IdleConfig::default());
        let ran = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&ran);
        executor.add_task(move || async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });

        // The closure must not have run inside add_task.
        assert!(!ran.load(Ordering::SeqCst));

        executor.wait_until_idle().await;
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn a_failing_task_does_not_block_the_next() {
        let executor = IdleExecutor::new(IdleConfig::default());
        let ran = Arc::new(AtomicBool::new(false));

        executor.add_task(|| async { Err(anyhow::anyhow!("disk on fire")) });

        let flag = Arc::clone(&ran);
        executor.add_task(move || async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });

        executor.wait_until_idle().await;
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(executor.pending(), 0);
    }

    #[tokio::test]
    async fn pending_counts_queued_work() {
        let executor = IdleExecutor::new(IdleConfig::default());
        for _ in 0..3 {
            executor.add_task(|| async { Ok(()) });
        }
        assert!(executor.pending() > 0);

        executor.wait_until_idle().await;
        assert_eq!(executor.pending(), 0);
    }
}
