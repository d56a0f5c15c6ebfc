//! Configuration loaded from a JSON document.

use std::path::{Path, PathBuf};

use anyhow::{format_err, Error};
use serde::{Deserialize, Serialize};

fn default_bucket() -> String {
    "bucket".to_string()
}

fn default_workers() -> usize {
    4
}

fn default_max_index_size() -> usize {
    256
}

fn default_prefix_index_path() -> PathBuf {
    PathBuf::from("/var/log/prefix_index_data.json")
}

/// Connection settings for the object store.
///
/// The endpoint locator selects the backend: `dir:<path>` serves objects
/// from a local directory tree, `mem:<name>` from a process wide
/// in-memory store (see [`crate::store::connect`]).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct S3Config {
    pub endpoint: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

/// Top level data mover configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct MoverConfig {
    pub s3: S3Config,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_max_index_size")]
    pub max_index_size: usize,
    /// Opaque NFS cluster name stamped into every index batch.
    #[serde(default)]
    pub nfs_cluster: String,
    /// Destination root for `get` operations.
    #[serde(default)]
    pub dest_path: PathBuf,
    #[serde(default)]
    pub dryrun: bool,
    /// Location of the persistent prefix index produced by an earlier
    /// indexing run.
    #[serde(default = "default_prefix_index_path")]
    pub prefix_index_path: PathBuf,
    /// Where to write the final transfer summary. No report if unset.
    #[serde(default)]
    pub report_path: Option<PathBuf>,
}

impl MoverConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|err| format_err!("unable to read config {:?} - {}", path, err))?;
        serde_json::from_str(&contents)
            .map_err(|err| format_err!("malformed config {:?} - {}", path, err))
    }
}
