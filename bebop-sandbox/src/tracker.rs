//! Registry of in-flight background invocations.
//!
//! Invocations are detached from the request that launched them: the HTTP
//! response may finish first. The tracker keeps a handle to every task so
//! the server can wait for all of them before exiting.

use std::future::Future;
use std::sync::Mutex;

use tokio::task::{JoinError, JoinSet};

/// Thread-safe set of detached invocation tasks.
#[derive(Debug, Default)]
pub struct InvocationTracker {
    tasks: Mutex<JoinSet<()>>,
}

impl InvocationTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` on the current runtime and track it until it settles.
    ///
    /// Finished tasks are reaped first.
    ///
    /// # Panics
    /// Panics if the internal `Mutex` is poisoned, or if called outside a
    /// Tokio runtime.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        let mut tasks = self.tasks.lock().expect("invocation tracker lock poisoned");
        while let Some(result) = tasks.try_join_next() {
            report(result);
        }
        tasks.spawn(task);
    }

    /// Number of tracked tasks, including finished but unreaped ones.
    ///
    /// # Panics
    /// Panics if the internal `Mutex` is poisoned.
    #[must_use]
    #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
    pub fn len(&self) -> usize {
        self.tasks.lock().expect("invocation tracker lock poisoned").len()
    }

    /// `true` when no tasks are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until every tracked task has settled.
    ///
    /// Tasks spawned while draining are waited for as well.
    ///
    /// # Panics
    /// Panics if the internal `Mutex` is poisoned.
    pub async fn drain(&self) {
        loop {
            let mut batch = {
                #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
                let mut tasks = self.tasks.lock().expect("invocation tracker lock poisoned");
                std::mem::take(&mut *tasks)
            };
            if batch.is_empty() {
                return;
            }
            tracing::info!(pending = batch.len(), "waiting for in-flight invocations");
            while let Some(result) = batch.join_next().await {
                report(result);
            }
        }
    }
}

fn report(result: Result<(), JoinError>) {
    if let Err(e) = result {
        tracing::error!(error = %e, "invocation task did not complete");
    }
}
