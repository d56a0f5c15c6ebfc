//! Object store backed by a directory tree.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{format_err, Error};

use super::{object_key, KeyIter, ObjectStore, StoreError};

/// Serves objects from `<root>/<bucket>/<key>`.
///
/// This is the deployment target for NFS staging shares and the backend
/// the integration tests run against.
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn key_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

impl ObjectStore for DirStore {
    fn put_object(&self, bucket: &str, local_path: &Path) -> Result<(), Error> {
        if !local_path.is_file() {
            return Err(StoreError::NotFound(local_path.to_string_lossy().to_string()).into());
        }
        let target = self.key_path(bucket, &object_key(local_path));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(StoreError::Io)?;
        }
        fs::copy(local_path, &target).map_err(StoreError::Io)?;
        Ok(())
    }

    fn get_object(&self, bucket: &str, key: &str, dest: &Path) -> Result<(), Error> {
        let source = self.key_path(bucket, key);
        if !source.is_file() {
            return Err(StoreError::NotFound(key.to_string()).into());
        }
        fs::copy(&source, dest).map_err(StoreError::Io)?;
        Ok(())
    }

    fn delete_object(&self, bucket: &str, key: &str) -> Result<(), Error> {
        let path = self.key_path(bucket, key);
        if !path.is_file() {
            return Err(StoreError::NotFound(key.to_string()).into());
        }
        fs::remove_file(&path).map_err(StoreError::Io)?;
        Ok(())
    }

    fn list_objects(&self, bucket: &str, prefix: &str) -> Result<KeyIter, Error> {
        let dir = self.key_path(bucket, prefix);
        let prefix = prefix.to_string();
        let entries =
            fs::read_dir(&dir).map_err(|err| format_err!("list {:?} failed: {}", dir, err))?;
        let iter = entries.map(move |entry| -> Result<String, Error> {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type()?.is_dir() {
                Ok(format!("{}{}/", prefix, name))
            } else {
                Ok(format!("{}{}", prefix, name))
            }
        });
        Ok(Box::new(iter))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn collect_keys(store: &DirStore, bucket: &str, prefix: &str) -> BTreeSet<String> {
        store
            .list_objects(bucket, prefix)
            .unwrap()
            .map(|key| key.unwrap())
            .collect()
    }

    #[test]
    fn put_get_delete_round_trip() -> Result<(), Error> {
        let scratch = tempfile::tempdir()?;
        let source = scratch.path().join("f1");
        fs::write(&source, b"payload")?;

        let store = DirStore::new(scratch.path().join("store"));
        store.put_object("bucket", &source)?;

        let key = object_key(&source);
        let restored = scratch.path().join("restored");
        store.get_object("bucket", &key, &restored)?;
        assert_eq!(fs::read(&restored)?, b"payload");

        store.delete_object("bucket", &key)?;
        let missing = store.get_object("bucket", &key, &restored);
        assert!(missing.is_err());
        Ok(())
    }

    #[test]
    fn listing_marks_sub_prefixes() -> Result<(), Error> {
        let scratch = tempfile::tempdir()?;
        let store_root = scratch.path().join("store");
        fs::create_dir_all(store_root.join("bucket/data/sub"))?;
        fs::write(store_root.join("bucket/data/k1"), b"1")?;
        fs::write(store_root.join("bucket/data/sub/k2"), b"2")?;

        let store = DirStore::new(&store_root);
        let keys = collect_keys(&store, "bucket", "data/");
        let expected: BTreeSet<String> =
            vec!["data/k1".to_string(), "data/sub/".to_string()].into_iter().collect();
        assert_eq!(keys, expected);
        Ok(())
    }
}
