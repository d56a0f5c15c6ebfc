//! Object store capability.
//!
//! Transfer executors only see the [`ObjectStore`] trait; backend
//! selection happens once per worker in [`connect`]. Key normalization
//! (descriptor objects vs. bare strings in the various client
//! libraries) is a backend concern, the engine always works on plain
//! `String` keys.

use std::path::Path;

use anyhow::{bail, Error};

use crate::config::S3Config;

mod dir_store;
mod mem_store;
mod prefix_index;

pub use dir_store::DirStore;
pub use mem_store::MemStore;
pub use prefix_index::{PrefixIndexData, PrefixStat};

/// Lazy object key listing. Not restartable, consume once.
pub type KeyIter = Box<dyn Iterator<Item = Result<String, Error>> + Send>;

/// Failure classes reported by store backends.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("no such key: {0}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Operations the transfer executors need from a store backend.
///
/// Listing returns the immediate children of `prefix`; a child that
/// groups further keys is yielded with a trailing `/`. Prefixes are
/// either empty or end with `/`.
pub trait ObjectStore: Send {
    /// Upload a local file. The object key is the file path with the
    /// leading `/` stripped.
    fn put_object(&self, bucket: &str, local_path: &Path) -> Result<(), Error>;

    /// Download the object at `key` to the local path `dest`.
    fn get_object(&self, bucket: &str, key: &str, dest: &Path) -> Result<(), Error>;

    fn delete_object(&self, bucket: &str, key: &str) -> Result<(), Error>;

    fn list_objects(&self, bucket: &str, prefix: &str) -> Result<KeyIter, Error>;
}

/// Object key for a local file path.
pub fn object_key(local_path: &Path) -> String {
    let path = local_path.to_string_lossy();
    path.strip_prefix('/').unwrap_or(&path).to_string()
}

/// Build the store backend selected by the endpoint locator.
///
/// Endpoints that would need a wire level client library (minio, dss)
/// are reported as a connect failure; the worker then runs degraded and
/// every store task of that worker fails.
pub fn connect(config: &S3Config) -> Result<Box<dyn ObjectStore>, Error> {
    let endpoint = config.endpoint.trim();
    if let Some(root) = endpoint.strip_prefix("dir:") {
        Ok(Box::new(DirStore::new(root)))
    } else if let Some(name) = endpoint.strip_prefix("mem:") {
        Ok(Box::new(MemStore::open(name)))
    } else {
        bail!("no client library for endpoint '{}'", endpoint);
    }
}
