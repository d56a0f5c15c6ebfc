//! Recursive filesystem indexing.

use anyhow::Error;

use super::iterate::{DirEvent, DirIterator};
use super::pool::WorkerContext;
use super::task::{IndexParams, Task, TaskKind};

/// Index one directory.
///
/// Each child directory becomes an `index` task of its own and bumps the
/// progress count of this directory; file batches go to the index-data
/// channel. A directory without child directories is a leaf, and its
/// completion starts the termination bubble. Otherwise each child
/// bubbles on its own completion.
pub fn run(params: &IndexParams, ctx: &WorkerContext) -> Result<(), Error> {
    let dir = params.dir.to_string_lossy().to_string();
    ctx.tracker.register(&dir);

    let mut subdirs = 0usize;
    let iterator = DirIterator::open(&params.dir, &params.nfs_cluster, params.max_index_size)?;
    for event in iterator {
        match event {
            Ok(DirEvent::SubDir(path)) => {
                subdirs += 1;
                // Bump the count before the child task is visible to
                // other workers, so its bubble cannot outrun us.
                ctx.tracker.increment(&dir);
                ctx.queues.tasks.submit(Task::new(TaskKind::Index(IndexParams {
                    dir: path,
                    nfs_cluster: params.nfs_cluster.clone(),
                    max_index_size: params.max_index_size,
                })));
            }
            Ok(DirEvent::Batch(batch)) => {
                log::debug!(
                    "index batch: dir {:?}, {} files, {} bytes",
                    batch.dir,
                    batch.files.len(),
                    batch.size
                );
                ctx.queues.push_batch(batch);
            }
            Err(err) => log::error!("index {:?}: {}", params.dir, err),
        }
    }

    if subdirs == 0 {
        ctx.tracker.decrement_and_bubble(&dir);
    }
    Ok(())
}
