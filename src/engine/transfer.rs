//! The put/get/del batch executors.

use std::path::Path;

use anyhow::{bail, format_err, Error};

use crate::store::StoreError;
use crate::tools::last_segment;

use super::pool::WorkerContext;
use super::task::{GetParams, StatusMessage, TransferParams};

/// Upload every file of a batch, then report one status message.
///
/// Missing files are logged and counted as failure; failed uploads add
/// the file size to the failed-byte tally. A dry run reads each file to
/// still exercise the source filesystem, but uploads nothing.
pub fn put(params: &TransferParams, ctx: &WorkerContext) -> Result<(), Error> {
    let batch = &params.batch;
    let mut success = 0usize;
    let mut failed_bytes = 0u64;

    if let Some(store) = ctx.store.as_ref() {
        for file_name in &batch.files {
            let path = Path::new(&batch.dir).join(file_name);
            if !path.exists() {
                log::error!("upload: {:?} does not exist", path);
                continue;
            }
            if params.dryrun {
                match std::fs::read(&path) {
                    Ok(_) => success += 1,
                    Err(err) => log::error!("upload dry-run: read {:?} failed: {}", path, err),
                }
            } else {
                match store.put_object(&params.s3.bucket, &path) {
                    Ok(()) => success += 1,
                    Err(err) => {
                        log::error!("upload {:?} failed: {}", path, err);
                        failed_bytes += path.metadata().map(|m| m.len()).unwrap_or(0);
                    }
                }
            }
        }
    } else {
        log::error!(
            "upload: no object store connection, failing batch for {:?}",
            batch.dir
        );
    }

    ctx.queues.push_status(StatusMessage {
        success,
        failure: batch.files.len() - success,
        dir: batch.dir.clone(),
        size: failed_bytes,
    });
    Ok(())
}

/// Download every key of a batch into `dest_path/dir`.
///
/// The destination filename is the last path segment of the key. A
/// failure to create the destination directory aborts the task through
/// the executor error path, without a status message.
pub fn get(params: &GetParams, ctx: &WorkerContext) -> Result<(), Error> {
    if ctx.prefix_index.is_none() {
        bail!("prefix index data is not loaded");
    }
    let batch = &params.batch;
    let mut success = 0usize;

    if let Some(store) = ctx.store.as_ref() {
        let dest_dir = params.dest_path.join(batch.dir.trim_start_matches('/'));
        if !dest_dir.exists() {
            std::fs::create_dir_all(&dest_dir)
                .map_err(|err| format_err!("unable to create {:?} - {}", dest_dir, err))?;
        }
        for key in &batch.files {
            if params.dryrun {
                success += 1;
                continue;
            }
            let dest_file = dest_dir.join(last_segment(key));
            match store.get_object(&params.s3.bucket, key, &dest_file) {
                Ok(()) => success += 1,
                Err(err) => match err.downcast_ref::<StoreError>() {
                    Some(StoreError::NotFound(_)) => log::error!("download {}: no such key", key),
                    _ => log::error!("download {} failed: {}", key, err),
                },
            }
        }
    } else {
        log::error!(
            "download: no object store connection, failing batch for {:?}",
            batch.dir
        );
    }

    ctx.queues.push_status(StatusMessage {
        success,
        failure: batch.files.len() - success,
        dir: batch.dir.clone(),
        size: 0,
    });
    Ok(())
}

/// Delete every key of a batch.
pub fn delete(params: &TransferParams, ctx: &WorkerContext) -> Result<(), Error> {
    let batch = &params.batch;
    let mut success = 0usize;

    if let Some(store) = ctx.store.as_ref() {
        for key in &batch.files {
            if params.dryrun {
                success += 1;
                continue;
            }
            match store.delete_object(&params.s3.bucket, key) {
                Ok(()) => success += 1,
                Err(err) => match err.downcast_ref::<StoreError>() {
                    Some(StoreError::NotFound(_)) => log::error!("delete {}: no such key", key),
                    _ => log::error!("delete {} failed: {}", key, err),
                },
            }
        }
    } else {
        log::error!(
            "delete: no object store connection, failing batch for {:?}",
            batch.dir
        );
    }

    ctx.queues.push_status(StatusMessage {
        success,
        failure: batch.files.len() - success,
        dir: batch.dir.clone(),
        size: 0,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::S3Config;
    use crate::engine::progress::ProgressTracker;
    use crate::engine::queues::SharedQueues;
    use crate::engine::task::IndexBatch;
    use crate::store::{MemStore, ObjectStore, PrefixIndexData};

    fn s3(name: &str) -> S3Config {
        S3Config {
            endpoint: format!("mem:{}", name),
            access_key: String::new(),
            secret_key: String::new(),
            bucket: "bucket".to_string(),
        }
    }

    fn context(store: Option<Box<dyn ObjectStore>>) -> WorkerContext {
        WorkerContext {
            queues: SharedQueues::new(),
            tracker: Arc::new(ProgressTracker::new()),
            prefix_index: Some(Arc::new(PrefixIndexData::default())),
            store,
        }
    }

    fn batch(dir: &str, files: &[&str]) -> IndexBatch {
        IndexBatch {
            dir: dir.to_string(),
            files: files.iter().map(|name| name.to_string()).collect(),
            size: 0,
            nfs_cluster: String::new(),
        }
    }

    #[test]
    fn put_dry_run_counts_readable_files_as_success() -> Result<(), Error> {
        let scratch = tempfile::tempdir()?;
        std::fs::write(scratch.path().join("f1"), b"1")?;
        std::fs::write(scratch.path().join("f2"), b"2")?;

        MemStore::clear("put-dry");
        let ctx = context(Some(Box::new(MemStore::open("put-dry"))));
        let dir = scratch.path().to_string_lossy().to_string();
        put(
            &TransferParams {
                batch: batch(&dir, &["f1", "f2"]),
                s3: s3("put-dry"),
                dryrun: true,
            },
            &ctx,
        )?;

        let status = ctx.queues.drain_status();
        assert_eq!(status.len(), 1);
        assert_eq!(
            status[0],
            StatusMessage {
                success: 2,
                failure: 0,
                dir,
                size: 0
            }
        );
        Ok(())
    }

    #[test]
    fn put_counts_missing_files_as_failure() -> Result<(), Error> {
        let scratch = tempfile::tempdir()?;
        std::fs::write(scratch.path().join("present"), b"data")?;

        MemStore::clear("put-missing");
        let ctx = context(Some(Box::new(MemStore::open("put-missing"))));
        let dir = scratch.path().to_string_lossy().to_string();
        put(
            &TransferParams {
                batch: batch(&dir, &["present", "absent"]),
                s3: s3("put-missing"),
                dryrun: false,
            },
            &ctx,
        )?;

        let status = ctx.queues.drain_status();
        assert_eq!(status[0].success, 1);
        assert_eq!(status[0].failure, 1);
        Ok(())
    }

    #[test]
    fn delete_tallies_a_missing_key() -> Result<(), Error> {
        MemStore::clear("del");
        let scratch = tempfile::tempdir()?;
        let store = MemStore::open("del");
        for name in &["k1", "k2"] {
            let local = scratch.path().join(name);
            std::fs::write(&local, b"x")?;
            store.put_object("bucket", &local)?;
        }
        let prefix = format!("{}/", crate::store::object_key(scratch.path()));

        let ctx = context(Some(Box::new(MemStore::open("del"))));
        let keys = [
            format!("{}k1", prefix),
            format!("{}k2", prefix),
            format!("{}gone", prefix),
        ];
        let key_refs: Vec<&str> = keys.iter().map(|key| key.as_str()).collect();
        delete(
            &TransferParams {
                batch: batch(&prefix, &key_refs),
                s3: s3("del"),
                dryrun: false,
            },
            &ctx,
        )?;

        let status = ctx.queues.drain_status();
        assert_eq!(status[0].success, 2);
        assert_eq!(status[0].failure, 1);
        assert_eq!(status[0].dir, prefix);
        Ok(())
    }

    #[test]
    fn degraded_worker_fails_the_whole_batch() -> Result<(), Error> {
        let ctx = context(None);
        delete(
            &TransferParams {
                batch: batch("/x", &["k1", "k2", "k3"]),
                s3: s3("none"),
                dryrun: false,
            },
            &ctx,
        )?;

        let status = ctx.queues.drain_status();
        assert_eq!(
            status[0],
            StatusMessage {
                success: 0,
                failure: 3,
                dir: "/x".to_string(),
                size: 0
            }
        );
        Ok(())
    }

    #[test]
    fn get_restores_keys_under_the_destination() -> Result<(), Error> {
        MemStore::clear("get");
        let scratch = tempfile::tempdir()?;
        let store = MemStore::open("get");
        let local = scratch.path().join("f1");
        std::fs::write(&local, b"payload")?;
        store.put_object("bucket", &local)?;

        let prefix = format!("{}/", crate::store::object_key(scratch.path()));
        let dest = tempfile::tempdir()?;

        let ctx = context(Some(Box::new(MemStore::open("get"))));
        let key = format!("{}f1", prefix);
        get(
            &GetParams {
                batch: batch(&prefix, &[key.as_str()]),
                s3: s3("get"),
                dest_path: dest.path().to_owned(),
                dryrun: false,
            },
            &ctx,
        )?;

        let status = ctx.queues.drain_status();
        assert_eq!(status[0].success, 1);
        assert_eq!(status[0].failure, 0);

        let restored = dest.path().join(prefix.trim_start_matches('/')).join("f1");
        assert_eq!(std::fs::read(&restored)?, b"payload");
        Ok(())
    }
}
