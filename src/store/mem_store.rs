//! Process wide in-memory object store.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Mutex;

use anyhow::Error;
use lazy_static::lazy_static;

use super::{object_key, KeyIter, ObjectStore, StoreError};

type Objects = BTreeMap<String, Vec<u8>>;
type Buckets = HashMap<String, Objects>;

lazy_static! {
    static ref STORES: Mutex<HashMap<String, Buckets>> = Mutex::new(HashMap::new());
}

/// In-memory store shared process wide by name, so that every worker's
/// private connection sees the same objects. Used by unit tests and
/// dry-run rigs.
pub struct MemStore {
    name: String,
}

impl MemStore {
    pub fn open<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }

    /// Drop every object under `name`. Test rigs call this between runs.
    pub fn clear(name: &str) {
        STORES.lock().unwrap().remove(name);
    }
}

impl ObjectStore for MemStore {
    fn put_object(&self, bucket: &str, local_path: &Path) -> Result<(), Error> {
        if !local_path.is_file() {
            return Err(StoreError::NotFound(local_path.to_string_lossy().to_string()).into());
        }
        let data = std::fs::read(local_path).map_err(StoreError::Io)?;
        let mut stores = STORES.lock().unwrap();
        stores
            .entry(self.name.clone())
            .or_insert_with(HashMap::new)
            .entry(bucket.to_string())
            .or_insert_with(BTreeMap::new)
            .insert(object_key(local_path), data);
        Ok(())
    }

    fn get_object(&self, bucket: &str, key: &str, dest: &Path) -> Result<(), Error> {
        let stores = STORES.lock().unwrap();
        let data = stores
            .get(&self.name)
            .and_then(|buckets| buckets.get(bucket))
            .and_then(|objects| objects.get(key))
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        std::fs::write(dest, data).map_err(StoreError::Io)?;
        Ok(())
    }

    fn delete_object(&self, bucket: &str, key: &str) -> Result<(), Error> {
        let mut stores = STORES.lock().unwrap();
        let removed = stores
            .get_mut(&self.name)
            .and_then(|buckets| buckets.get_mut(bucket))
            .and_then(|objects| objects.remove(key));
        match removed {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(key.to_string()).into()),
        }
    }

    fn list_objects(&self, bucket: &str, prefix: &str) -> Result<KeyIter, Error> {
        let stores = STORES.lock().unwrap();
        let mut children = BTreeSet::new();
        if let Some(objects) = stores.get(&self.name).and_then(|buckets| buckets.get(bucket)) {
            for key in objects.keys() {
                if !key.starts_with(prefix) {
                    continue;
                }
                let rest = &key[prefix.len()..];
                if rest.is_empty() {
                    continue;
                }
                match rest.find('/') {
                    Some(pos) => {
                        children.insert(format!("{}{}/", prefix, &rest[..pos]));
                    }
                    None => {
                        children.insert(key.clone());
                    }
                }
            }
        }
        Ok(Box::new(children.into_iter().map(Ok)))
    }
}
