//! Recursive object store listing, gated by the prefix index.

use anyhow::{bail, Error};

use crate::store::PrefixIndexData;

use super::pool::WorkerContext;
use super::task::{IndexBatch, ListParams, Task, TaskKind};

/// One step of a prefix enumeration.
enum KeyEvent {
    /// A key the prefix index knows as a sub prefix.
    SubPrefix(String),
    /// A bounded group of plain object keys.
    Batch(Vec<String>),
}

/// Splits a key listing into sub prefixes and bounded key batches, with
/// the same flush rule as the directory iterator: the key that crosses
/// the threshold opens the next batch.
struct KeyBatcher<'a, I> {
    keys: I,
    prefix_index: &'a PrefixIndexData,
    max_index_size: usize,
    pending: Vec<String>,
    done: bool,
}

impl<'a, I> KeyBatcher<'a, I> {
    fn new(keys: I, prefix_index: &'a PrefixIndexData, max_index_size: usize) -> Self {
        Self {
            keys,
            prefix_index,
            max_index_size: max_index_size.max(1),
            pending: Vec::new(),
            done: false,
        }
    }
}

impl<'a, I: Iterator<Item = Result<String, Error>>> Iterator for KeyBatcher<'a, I> {
    type Item = Result<KeyEvent, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.keys.next() {
                Some(Err(err)) => return Some(Err(err)),
                Some(Ok(key)) => {
                    // A prefix can group both keys and sub prefixes.
                    if self.prefix_index.contains(&key) {
                        return Some(Ok(KeyEvent::SubPrefix(key)));
                    }
                    if self.pending.len() == self.max_index_size {
                        let batch = std::mem::replace(&mut self.pending, vec![key]);
                        return Some(Ok(KeyEvent::Batch(batch)));
                    }
                    self.pending.push(key);
                }
                None => {
                    self.done = true;
                    if self.pending.is_empty() {
                        return None;
                    }
                    let batch = std::mem::take(&mut self.pending);
                    return Some(Ok(KeyEvent::Batch(batch)));
                }
            }
        }
    }
}

/// List one prefix.
///
/// A prefix known to the prefix index is iterated directly: keys that
/// are themselves known prefixes spawn `list` tasks, everything else is
/// grouped into key batches for the downstream transfer stage. A prefix
/// whose listing produced only plain keys is a leaf and bubbles. An
/// unknown prefix treats every returned key as a sub prefix. An empty
/// listing is logged and neither registers nor bubbles the prefix.
pub fn run(params: &ListParams, ctx: &WorkerContext) -> Result<(), Error> {
    let prefix_index = match ctx.prefix_index.as_ref() {
        Some(data) => data.as_ref(),
        None => bail!("prefix index data is not loaded"),
    };
    let store = match ctx.store.as_ref() {
        Some(store) => store,
        None => bail!("no object store connection for prefix '{}'", params.prefix),
    };

    let prefix = params.prefix.trim().to_string();
    let bucket = params.s3.bucket.as_str();

    let keys = store.list_objects(bucket, &prefix)?;
    let mut empty = true;

    if let Some(stat) = prefix_index.get(&prefix) {
        log::debug!(
            "prefix '{}': indexed with {} files, {} bytes",
            prefix,
            stat.files,
            stat.size
        );
        let mut lowest_level = true;
        for event in KeyBatcher::new(keys, prefix_index, params.max_index_size) {
            match event {
                Ok(KeyEvent::SubPrefix(sub)) => {
                    empty = false;
                    lowest_level = false;
                    ctx.tracker.increment(&prefix);
                    ctx.queues.tasks.submit(Task::new(TaskKind::List(ListParams {
                        prefix: sub,
                        s3: params.s3.clone(),
                        max_index_size: params.max_index_size,
                    })));
                }
                Ok(KeyEvent::Batch(files)) => {
                    empty = false;
                    ctx.queues.push_batch(IndexBatch {
                        dir: prefix.clone(),
                        files,
                        size: 0,
                        nfs_cluster: String::new(),
                    });
                }
                Err(err) => log::error!("list {}: {}", prefix, err),
            }
        }
        if empty {
            log::error!("no object keys below prefix '{}'", prefix);
        } else if lowest_level {
            ctx.tracker.reset(&prefix);
            ctx.tracker.decrement_and_bubble(&prefix);
        }
    } else {
        for key in keys {
            match key {
                Ok(key) => {
                    empty = false;
                    ctx.tracker.increment(&prefix);
                    ctx.queues.tasks.submit(Task::new(TaskKind::List(ListParams {
                        prefix: key,
                        s3: params.s3.clone(),
                        max_index_size: params.max_index_size,
                    })));
                }
                Err(err) => log::error!("list {}: {}", prefix, err),
            }
        }
        if empty {
            log::error!("no object keys below prefix '{}'", prefix);
        }
    }

    Ok(())
}
