use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// What happened to the tasks handed to [`WorkerPool::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolReport {
    /// Tasks the producer handed to the queue.
    pub dispatched: usize,
    /// Tasks a worker dequeued and ran to completion.
    pub processed: usize,
    /// Whether the run was cancelled before the queue drained.
    pub cancelled: bool,
}

/// A fixed number of long-lived workers draining one shared queue.
///
/// Each call to [`run`](WorkerPool::run) spawns the workers, feeds them every
/// task exactly once, closes the queue and waits for all of them to exit.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub async fn run<T, I, F, Fut>(
        &self,
        tasks: I,
        cancel: &CancellationToken,
        handler: F,
    ) -> PoolReport
    where
        T: Send + 'static,
        I: IntoIterator<Item = T>,
        F: Fn(usize, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // Capacity 1 is the closest tokio gets to an unbuffered handoff.
        let (tx, rx) = mpsc::channel::<T>(1);
        let rx = Arc::new(Mutex::new(rx));
        let handler = Arc::new(handler);

        let mut workers = JoinSet::new();
        for worker in 0..self.size {
            let rx = Arc::clone(&rx);
            let handler = Arc::clone(&handler);
            let cancel = cancel.clone();

            workers.spawn(async move {
                let mut processed = 0;
                loop {
                    let next = {
                        let mut rx = rx.lock().await;
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => None,
                            task = rx.recv() => task,
                        }
                    };

                    let Some(task) = next else {
                        log::debug!("worker {}: no more targets to process, exiting", worker);
                        break;
                    };

                    handler(worker, task).await;
                    processed += 1;
                }
                processed
            });
        }
        drop(rx);

        let mut dispatched = 0;
        for task in tasks {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::warn!("collection cancelled, {} targets dispatched", dispatched);
                    break;
                }
                sent = tx.send(task) => {
                    if sent.is_err() {
                        log::error!("every worker has exited, {} targets dispatched", dispatched);
                        break;
                    }
                    dispatched += 1;
                }
            }
        }
        drop(tx);

        let mut processed = 0;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(n) => processed += n,
                Err(e) => log::error!("worker task failed: {}", e),
            }
        }

        PoolReport {
            dispatched,
            processed,
            cancelled: cancel.is_cancelled(),
        }
    }
}
