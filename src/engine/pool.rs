//! The worker pool hosting the task executors.

use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{format_err, Error};

use crate::config::S3Config;
use crate::store::{self, ObjectStore, PrefixIndexData};

use super::progress::ProgressTracker;
use super::queues::{SharedQueues, TaskMessage};

/// Everything a worker hands to an executor: the shared channels, the
/// progress tracker, the loaded prefix index, and the worker's own
/// object store connection.
pub struct WorkerContext {
    pub queues: SharedQueues,
    pub tracker: Arc<ProgressTracker>,
    pub prefix_index: Option<Arc<PrefixIndexData>>,
    pub store: Option<Box<dyn ObjectStore>>,
}

/// Pool of symmetric workers.
///
/// Each thread opens its own long lived store connection on entry and
/// pops tasks until it sees a shutdown message. Any worker executes any
/// operation.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(
        threads: usize,
        queues: &SharedQueues,
        tracker: &Arc<ProgressTracker>,
        prefix_index: &Option<Arc<PrefixIndexData>>,
        s3: &S3Config,
    ) -> Result<Self, Error> {
        let mut handles = Vec::with_capacity(threads);
        for i in 0..threads {
            let queues = queues.clone();
            let tracker = Arc::clone(tracker);
            let prefix_index = prefix_index.clone();
            let s3 = s3.clone();
            let handle = std::thread::Builder::new()
                .name(format!("worker{}", i))
                .spawn(move || {
                    // A failed connect leaves the worker degraded: store
                    // tasks fail with a full failure status, indexing
                    // still works.
                    let store = match store::connect(&s3) {
                        Ok(store) => Some(store),
                        Err(err) => {
                            log::error!("worker{}: unable to connect object store: {}", i, err);
                            None
                        }
                    };
                    let ctx = WorkerContext {
                        queues,
                        tracker,
                        prefix_index,
                        store,
                    };
                    worker_loop(&ctx);
                })
                .map_err(|err| format_err!("unable to spawn worker{} - {}", i, err))?;
            handles.push(handle);
        }
        Ok(Self { handles })
    }

    /// Wait for every worker to exit its loop.
    pub fn join(self) {
        for handle in self.handles {
            if handle.join().is_err() {
                log::error!("worker thread panicked");
            }
        }
    }
}

fn worker_loop(ctx: &WorkerContext) {
    while let Some(message) = ctx.queues.tasks.recv() {
        match message {
            TaskMessage::Run(task) => {
                task.execute(ctx);
                ctx.queues.tasks.task_done();
            }
            TaskMessage::Shutdown => break,
        }
    }
}
