//! Shared channels between the engine, its workers, and the downstream
//! transfer stage.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::task::{IndexBatch, StatusMessage, Task};

/// Message on the task channel. Workers stop on `Shutdown`.
pub enum TaskMessage {
    Run(Task),
    Shutdown,
}

/// Task channel plus an outstanding-task counter.
///
/// The counter is bumped on submit and dropped only after the executor
/// returns, so it covers the window between queue pop and task
/// completion: `outstanding() == 0` means the queue is drained *and* no
/// worker is mid-task.
#[derive(Clone)]
pub struct TaskQueue {
    tx: Sender<TaskMessage>,
    rx: Receiver<TaskMessage>,
    outstanding: Arc<AtomicUsize>,
}

impl TaskQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            outstanding: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue a task.
    pub fn submit(&self, task: Task) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(TaskMessage::Run(task)).is_err() {
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
        }
    }

    pub fn send_shutdown(&self) {
        let _ = self.tx.send(TaskMessage::Shutdown);
    }

    /// Block-pop the next message; `None` once the channel is closed.
    pub fn recv(&self) -> Option<TaskMessage> {
        self.rx.recv().ok()
    }

    /// Mark a popped task finished.
    pub fn task_done(&self) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}

/// The channel set owned by the engine: tasks in flight, index batches
/// for the downstream transfer stage, per batch status results.
#[derive(Clone)]
pub struct SharedQueues {
    pub tasks: TaskQueue,
    index_tx: Sender<IndexBatch>,
    index_rx: Receiver<IndexBatch>,
    status_tx: Sender<StatusMessage>,
    status_rx: Receiver<StatusMessage>,
}

impl SharedQueues {
    pub fn new() -> Self {
        let (index_tx, index_rx) = unbounded();
        let (status_tx, status_rx) = unbounded();
        Self {
            tasks: TaskQueue::new(),
            index_tx,
            index_rx,
            status_tx,
            status_rx,
        }
    }

    pub fn push_batch(&self, batch: IndexBatch) {
        let _ = self.index_tx.send(batch);
    }

    pub fn push_status(&self, status: StatusMessage) {
        let _ = self.status_tx.send(status);
    }

    /// Take every index batch queued so far.
    pub fn drain_batches(&self) -> Vec<IndexBatch> {
        self.index_rx.try_iter().collect()
    }

    /// Take every status message queued so far.
    pub fn drain_status(&self) -> Vec<StatusMessage> {
        self.status_rx.try_iter().collect()
    }
}
