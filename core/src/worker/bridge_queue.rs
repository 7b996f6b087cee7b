//! Component B: an unbounded FIFO queue of outbound RPC operations with
//! lifecycle control. Every RPC a worker issues (poll, complete, heartbeat)
//! goes through one of these so that shutdown can cancel outstanding work
//! deterministically rather than leaking tasks.

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("bridge queue is already shut down")]
    AlreadyShutdown,
    #[error("run() called on a queue that is already processing or shut down")]
    AlreadyRunning,
}

type Item = (BoxFuture<'static, ()>, Box<dyn FnOnce() + Send>);

enum BridgeState {
    Idle(Vec<Item>),
    Processing(mpsc::UnboundedSender<Item>),
    ShutDown,
}

/// `idle(buffer) -> processing(stream) -> shutdown`, per §4.B.
pub struct BridgeClientQueue {
    state: Mutex<BridgeState>,
}

impl Default for BridgeClientQueue {
    fn default() -> Self {
        Self { state: Mutex::new(BridgeState::Idle(Vec::new())) }
    }
}

impl BridgeClientQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues an async-producing closure and an `on_shutdown` callback
    /// that fires instead, if the item never gets a chance to run because
    /// the queue was shut down first.
    pub fn submit(
        &self,
        work: BoxFuture<'static, ()>,
        on_shutdown: impl FnOnce() + Send + 'static,
    ) -> Result<(), QueueError> {
        let mut guard = self.state.lock();
        match &mut *guard {
            BridgeState::Idle(buf) => {
                buf.push((work, Box::new(on_shutdown)));
                Ok(())
            }
            BridgeState::Processing(tx) => {
                if tx.send((work, Box::new(on_shutdown))).is_err() {
                    Err(QueueError::AlreadyShutdown)
                } else {
                    Ok(())
                }
            }
            BridgeState::ShutDown => Err(QueueError::AlreadyShutdown),
        }
    }

    /// Begins processing: drains the queue by spawning one task per item.
    /// Returns once the queue is shut down and all outstanding tasks have
    /// been cancelled.
    pub async fn run(&self) -> Result<(), QueueError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let buffered = {
            let mut guard = self.state.lock();
            match std::mem::replace(&mut *guard, BridgeState::Processing(tx.clone())) {
                BridgeState::Idle(buf) => buf,
                other => {
                    *guard = other;
                    return Err(QueueError::AlreadyRunning);
                }
            }
        };
        for item in buffered {
            // The queue only just transitioned to Processing on this thread,
            // so the channel cannot have been closed yet.
            let _ = tx.send(item);
        }
        drop(tx);

        let mut tasks: JoinSet<()> = JoinSet::new();
        loop {
            tokio::select! {
                biased;
                maybe_item = rx.recv() => {
                    match maybe_item {
                        Some((fut, _on_shutdown)) => { tasks.spawn(fut); }
                        None => break,
                    }
                }
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }
        // The channel only closes once every sender (including the one held
        // by `submit`'s Processing branch) is dropped, which happens when
        // `shutdown()` replaces the state. Remaining tasks are aborted so
        // `run()` returns promptly instead of waiting out slow RPCs.
        tasks.shutdown().await;
        Ok(())
    }

    /// Finishes the internal stream, causing `run()` to cancel outstanding
    /// tasks and return; later `submit` calls fail. Calling this twice is a
    /// programmer error (fatal), matching §4.B's state machine rules.
    pub fn shutdown(&self) {
        let mut guard = self.state.lock();
        match std::mem::replace(&mut *guard, BridgeState::ShutDown) {
            BridgeState::ShutDown => panic!("BridgeClientQueue::shutdown() called twice"),
            BridgeState::Idle(buf) => {
                for (_, on_shutdown) in buf {
                    on_shutdown();
                }
            }
            BridgeState::Processing(tx) => drop(tx),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(*self.state.lock(), BridgeState::ShutDown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn submit_before_run_is_buffered_then_drained() {
        let q = Arc::new(BridgeClientQueue::new());
        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let ran = ran.clone();
            q.submit(
                Box::pin(async move {
                    ran.fetch_add(1, Ordering::SeqCst);
                }),
                || {},
            )
            .unwrap();
        }
        let q2 = q.clone();
        let handle = tokio::spawn(async move { q2.run().await });
        // Give the spawned tasks a chance to run, then shut down.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        q.shutdown();
        handle.await.unwrap().unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn submit_after_shutdown_fails_and_runs_on_shutdown_hook() {
        let q = BridgeClientQueue::new();
        q.shutdown();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = fired.clone();
        let err = q.submit(Box::pin(async {}), move || {
            fired2.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(err, Err(QueueError::AlreadyShutdown));
        assert_eq!(fired.load(Ordering::SeqCst), 0, "on_shutdown only fires for items that were buffered before shutdown");
    }

    #[tokio::test]
    async fn run_twice_is_an_error() {
        let q = Arc::new(BridgeClientQueue::new());
        let q2 = q.clone();
        let handle = tokio::spawn(async move { q2.run().await });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(q.run().await, Err(QueueError::AlreadyRunning));
        q.shutdown();
        handle.await.unwrap().unwrap();
    }

    #[test]
    #[should_panic]
    fn shutdown_twice_panics() {
        let q = BridgeClientQueue::new();
        q.shutdown();
        q.shutdown();
    }
}
