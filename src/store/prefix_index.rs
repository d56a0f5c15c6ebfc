//! The persistent prefix index.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{format_err, Error};
use serde::Deserialize;

/// Per prefix accounting recorded by an earlier indexing run.
#[derive(Clone, Debug, Deserialize)]
pub struct PrefixStat {
    pub files: u64,
    pub size: u64,
}

/// Immutable `prefix -> {files, size}` mapping loaded once at startup.
///
/// Presence of a prefix means its keys are known to group object keys:
/// the list executor iterates it directly instead of descending further.
/// Read only after load, safe to share between workers without locking.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct PrefixIndexData {
    prefixes: HashMap<String, PrefixStat>,
}

impl PrefixIndexData {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|err| format_err!("unable to read prefix index {:?} - {}", path, err))?;
        serde_json::from_str(&contents)
            .map_err(|err| format_err!("malformed prefix index {:?} - {}", path, err))
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.prefixes.contains_key(prefix)
    }

    pub fn get(&self, prefix: &str) -> Option<&PrefixStat> {
        self.prefixes.get(prefix)
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }
}
