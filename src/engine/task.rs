//! Task records and the batch/status message shapes.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::config::S3Config;

use super::pool::WorkerContext;
use super::{index, list, transfer};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Bounded group of files (or object keys) under one directory or
/// prefix, the unit of downstream transfer work.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexBatch {
    pub dir: String,
    pub files: Vec<String>,
    /// Byte sum of the files in the batch; 0 for key batches produced by
    /// a listing.
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub nfs_cluster: String,
}

/// Per batch outcome of a transfer operation.
///
/// `success + failure` always equals the file count of the consumed
/// batch; `size` carries the failed-byte total of an upload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub success: usize,
    pub failure: usize,
    pub dir: String,
    #[serde(default)]
    pub size: u64,
}

/// Parameters of a recursive filesystem indexing step.
#[derive(Clone, Debug)]
pub struct IndexParams {
    pub dir: PathBuf,
    pub nfs_cluster: String,
    pub max_index_size: usize,
}

/// Parameters of a recursive object store listing step.
#[derive(Clone, Debug)]
pub struct ListParams {
    pub prefix: String,
    pub s3: S3Config,
    pub max_index_size: usize,
}

/// Parameters shared by the `put` and `del` batch executors.
#[derive(Clone, Debug)]
pub struct TransferParams {
    pub batch: IndexBatch,
    pub s3: S3Config,
    pub dryrun: bool,
}

/// Parameters of the `get` batch executor.
#[derive(Clone, Debug)]
pub struct GetParams {
    pub batch: IndexBatch,
    pub s3: S3Config,
    pub dest_path: PathBuf,
    pub dryrun: bool,
}

pub enum TaskKind {
    Index(IndexParams),
    List(ListParams),
    Put(TransferParams),
    Get(GetParams),
    Del(TransferParams),
}

impl TaskKind {
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::Index(_) => "index",
            TaskKind::List(_) => "list",
            TaskKind::Put(_) => "put",
            TaskKind::Get(_) => "get",
            TaskKind::Del(_) => "del",
        }
    }
}

/// Immutable unit of work. Ids are unique process wide.
pub struct Task {
    pub id: u64,
    pub kind: TaskKind,
}

impl Task {
    pub fn new(kind: TaskKind) -> Self {
        Self {
            id: NEXT_TASK_ID.fetch_add(1, Ordering::SeqCst),
            kind,
        }
    }

    /// Run the operation. Executor failures are logged and swallowed, so
    /// a bad task cannot poison the queue and is not retried.
    pub fn execute(&self, ctx: &WorkerContext) {
        let result = match &self.kind {
            TaskKind::Index(params) => index::run(params, ctx),
            TaskKind::List(params) => list::run(params, ctx),
            TaskKind::Put(params) => transfer::put(params, ctx),
            TaskKind::Get(params) => transfer::get(params, ctx),
            TaskKind::Del(params) => transfer::delete(params, ctx),
        };
        if let Err(err) = result {
            log::error!("task {} ({}): {}", self.id, self.kind.name(), err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn index_task() -> Task {
        Task::new(TaskKind::Index(IndexParams {
            dir: PathBuf::from("/tmp"),
            nfs_cluster: String::new(),
            max_index_size: 10,
        }))
    }

    #[test]
    fn task_ids_are_unique_across_threads() {
        let mut handles = Vec::new();
        for _ in 0..4 {
            handles.push(std::thread::spawn(|| {
                (0..100).map(|_| index_task().id).collect::<Vec<u64>>()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate task id {}", id);
            }
        }
    }
}
