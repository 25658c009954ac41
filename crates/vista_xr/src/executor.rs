//! Single-threaded executor the engine drives from the frame callback.
//!
//! Every async operation (capability check, session requests, tracking
//! setup, asset loads) runs here, so completions are only ever observed on
//! the frame thread.

use std::future::Future;

use futures::channel::oneshot;
use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;

/// Result of checking a [`Pending`] operation.
#[derive(Debug, PartialEq, Eq)]
pub enum PendingState<T> {
    Waiting,
    Ready(T),
    /// The task was dropped before producing a value.
    Dropped,
}

/// Handle to an operation spawned on the [`FrameExecutor`].
#[derive(Debug)]
pub struct Pending<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Pending<T> {
    /// Non-blocking check for completion. After `Ready` the handle is spent.
    pub fn poll_ready(&mut self) -> PendingState<T> {
        match self.rx.try_recv() {
            Ok(Some(value)) => PendingState::Ready(value),
            Ok(None) => PendingState::Waiting,
            Err(oneshot::Canceled) => PendingState::Dropped,
        }
    }
}

pub struct FrameExecutor {
    pool: LocalPool,
    spawner: LocalSpawner,
}

impl FrameExecutor {
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self { pool, spawner }
    }

    /// Start `future`; its output is delivered through the returned handle.
    pub fn spawn<T, F>(&self, future: F) -> Pending<T>
    where
        T: 'static,
        F: Future<Output = T> + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let task = async move {
            // Receiver dropped means nobody wants the result any more
            let _ = tx.send(future.await);
        };

        if let Err(err) = self.spawner.spawn_local(task) {
            log::error!("Failed to spawn frame task: {}", err);
        }

        Pending { rx }
    }

    /// Start `future` without tracking its result.
    pub fn spawn_detached<F>(&self, future: F)
    where
        F: Future<Output = ()> + 'static,
    {
        if let Err(err) = self.spawner.spawn_local(future) {
            log::error!("Failed to spawn frame task: {}", err);
        }
    }

    /// Poll every task that can make progress, then return.
    pub fn run_until_stalled(&mut self) {
        self.pool.run_until_stalled();
    }
}

impl Default for FrameExecutor {
    fn default() -> Self {
        Self::new()
    }
}
