//! The distributed task engine.
//!
//! A seed task (root directory for `index`, root prefix for `list`) is
//! placed on the task channel. Workers pop tasks and run the matching
//! executor, which lazily reads the filesystem or object store, emits
//! new tasks and index-data batches, and updates the shared progress
//! map. Completion of a subtree is detected through the progress map
//! alone, without a central join.

mod index;
mod iterate;
mod list;
mod pool;
mod progress;
mod queues;
mod task;
mod transfer;

pub use iterate::{DirEvent, DirIterator};
pub use pool::{WorkerContext, WorkerPool};
pub use progress::ProgressTracker;
pub use queues::{SharedQueues, TaskMessage, TaskQueue};
pub use task::{
    GetParams, IndexBatch, IndexParams, ListParams, StatusMessage, Task, TaskKind, TransferParams,
};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, format_err, Error};
use nix::sys::stat::{fchmodat, FchmodatFlags, Mode};
use serde::Serialize;

use crate::config::S3Config;
use crate::store::PrefixIndexData;

/// Aggregated outcome of a run, published as the report file.
#[derive(Debug, Default, Serialize)]
pub struct TransferSummary {
    pub batches: usize,
    pub success: usize,
    pub failure: usize,
    pub failed_bytes: u64,
}

impl TransferSummary {
    pub fn add(&mut self, status: &StatusMessage) {
        self.batches += 1;
        self.success += status.success;
        self.failure += status.failure;
        self.failed_bytes += status.size;
    }

    /// Publish the summary as JSON at `path`.
    ///
    /// The report is staged next to the target and renamed into place,
    /// so a monitoring reader never sees a half written document.
    /// owner(rw), everyone else (r) - status aggregation is meant to be
    /// scraped by other tools.
    pub fn write_report<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        let data = serde_json::to_vec_pretty(self)?;

        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, &data)
            .map_err(|err| format_err!("staging report {:?} failed: {}", tmp_path, err))?;

        let mode = Mode::from_bits_truncate(0o0644);
        if let Err(err) = fchmodat(None, &tmp_path, mode, FchmodatFlags::FollowSymlink) {
            let _ = std::fs::remove_file(&tmp_path);
            bail!("fchmodat {:?} failed: {}", tmp_path, err);
        }

        if let Err(err) = std::fs::rename(&tmp_path, path) {
            let _ = std::fs::remove_file(&tmp_path);
            bail!("replacing report {:?} failed: {}", path, err);
        }

        Ok(())
    }
}

/// The in-process runtime: channels, progress tracker, prefix index and
/// worker pool, with seed/wait/shutdown orchestration.
pub struct Engine {
    queues: SharedQueues,
    tracker: Arc<ProgressTracker>,
    workers: usize,
    pool: Option<WorkerPool>,
}

impl Engine {
    /// Spin up `workers` threads, each with its own store connection.
    pub fn start(
        workers: usize,
        s3: &S3Config,
        prefix_index: Option<PrefixIndexData>,
    ) -> Result<Self, Error> {
        if workers == 0 {
            bail!("worker pool needs at least one thread");
        }
        let queues = SharedQueues::new();
        let tracker = Arc::new(ProgressTracker::new());
        let prefix_index = prefix_index.map(Arc::new);
        let pool = WorkerPool::spawn(workers, &queues, &tracker, &prefix_index, s3)?;
        Ok(Self {
            queues,
            tracker,
            workers,
            pool: Some(pool),
        })
    }

    /// Queue a task.
    pub fn submit(&self, task: Task) {
        self.queues.tasks.submit(task);
    }

    /// Seed a recursive indexing of `dir`.
    pub fn index_tree(&self, dir: &Path, nfs_cluster: &str, max_index_size: usize) {
        self.submit(Task::new(TaskKind::Index(IndexParams {
            dir: dir.to_owned(),
            nfs_cluster: nfs_cluster.to_string(),
            max_index_size,
        })));
    }

    /// Seed a recursive listing of `prefix`.
    pub fn list_tree(&self, prefix: &str, s3: &S3Config, max_index_size: usize) {
        self.submit(Task::new(TaskKind::List(ListParams {
            prefix: prefix.to_string(),
            s3: s3.clone(),
            max_index_size,
        })));
    }

    /// Block until the task channel is drained and no worker is
    /// mid-task. Seed before calling, or this returns immediately.
    pub fn wait_idle(&self) {
        while self.queues.tasks.outstanding() > 0 {
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub fn drain_batches(&self) -> Vec<IndexBatch> {
        self.queues.drain_batches()
    }

    pub fn drain_status(&self) -> Vec<StatusMessage> {
        self.queues.drain_status()
    }

    /// Aggregate every status message queued so far.
    pub fn summary(&self) -> TransferSummary {
        let mut summary = TransferSummary::default();
        for status in self.drain_status() {
            summary.add(&status);
        }
        summary
    }

    /// Stop the pool: one shutdown message per worker, then join.
    pub fn shutdown(mut self) {
        for _ in 0..self.workers {
            self.queues.tasks.send_shutdown();
        }
        if let Some(pool) = self.pool.take() {
            pool.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_replaces_an_existing_file() -> Result<(), Error> {
        let scratch = tempfile::tempdir()?;
        let report_path = scratch.path().join("report.json");
        std::fs::write(&report_path, b"stale")?;

        let mut summary = TransferSummary::default();
        summary.add(&StatusMessage {
            success: 3,
            failure: 1,
            dir: "/A".to_string(),
            size: 10,
        });
        summary.write_report(&report_path)?;

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&report_path)?)?;
        assert_eq!(report["batches"], 1);
        assert_eq!(report["success"], 3);
        assert_eq!(report["failure"], 1);
        assert_eq!(report["failed_bytes"], 10);

        assert!(!report_path.with_extension("tmp").exists());
        Ok(())
    }
}
