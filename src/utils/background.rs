//! Fire-and-forget task dispatch.
//!
//! Work handed to [`BackgroundTasks`] is best effort: nobody awaits its result,
//! failures are only logged, and pending tasks are dropped with the runtime.
//! [`BackgroundTasks::drain`] exists for graceful shutdown and tests.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinSet;
use tracing::{debug, info_span, warn, Instrument};

#[derive(Clone, Default)]
pub struct BackgroundTasks {
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a detached task on the current runtime.
    pub fn spawn<F>(&self, label: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.lock();
        // reap whatever already finished so the set does not grow unbounded
        while let Some(finished) = tasks.try_join_next() {
            log_join_result(finished);
        }
        debug!(task = label, "dispatching background task");
        tasks.spawn(task.instrument(info_span!("background", task = label)));
    }

    /// Number of tasks not yet reaped.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Await every pending task, including tasks spawned while draining.
    pub async fn drain(&self) {
        loop {
            let mut tasks = std::mem::take(&mut *self.lock());
            if tasks.is_empty() {
                return;
            }
            while let Some(finished) = tasks.join_next().await {
                log_join_result(finished);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn log_join_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(err) = result {
        warn!(error = %err, "background task did not complete");
    }
}
