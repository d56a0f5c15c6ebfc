//! Shared progress-of-indexing map.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::tools::{key_depth, parent_key};

/// Maps a hash key (directory path or object prefix) to the number of
/// its direct children whose subtrees are still being indexed.
///
/// A key that drains to 0 is removed while its parent is still present,
/// and the completion bubbles into the parent. Root keys (depth <= 2, or
/// any key whose parent is not tracked) are retained; a root at 0 with
/// no other keys left is the global completion sentinel.
pub struct ProgressTracker {
    map: Mutex<HashMap<String, usize>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
        }
    }

    /// Make sure `key` is tracked, starting at 0.
    pub fn register(&self, key: &str) {
        let mut map = self.map.lock().unwrap();
        map.entry(key.to_string()).or_insert(0);
    }

    /// Record one more outstanding child under `key`.
    pub fn increment(&self, key: &str) {
        let mut map = self.map.lock().unwrap();
        *map.entry(key.to_string()).or_insert(0) += 1;
    }

    /// Force `key` to 0. The list executor uses this for a prefix whose
    /// listing produced only plain keys.
    pub fn reset(&self, key: &str) {
        let mut map = self.map.lock().unwrap();
        map.insert(key.to_string(), 0);
    }

    /// Termination detection: decrement `key` and, once a non-root key
    /// drains to 0, remove it and continue into its parent.
    ///
    /// The lock is never held across an iteration boundary. Removal only
    /// happens while the parent is still tracked, so a bubble cannot
    /// detach a subtree whose parent already terminated, and the root is
    /// never removed (its parent is not in the map).
    pub fn decrement_and_bubble(&self, key: &str) {
        let mut key = key.to_string();
        loop {
            let count = {
                let mut map = self.map.lock().unwrap();
                match map.get_mut(&key) {
                    Some(count) => {
                        if *count > 0 {
                            *count -= 1;
                        }
                        *count
                    }
                    None => return,
                }
            };

            if count != 0 || key_depth(&key) <= 2 {
                return;
            }

            let parent = parent_key(&key);
            {
                let mut map = self.map.lock().unwrap();
                if !map.contains_key(&parent) {
                    return;
                }
                map.remove(&key);
            }
            key = parent;
        }
    }

    /// True once only root keys remain, all drained to 0.
    pub fn is_drained(&self) -> bool {
        let map = self.map.lock().unwrap();
        map.values().all(|count| *count == 0)
            && map.keys().all(|key| !map.contains_key(&parent_key(key)))
    }

    pub fn snapshot(&self) -> HashMap<String, usize> {
        self.map.lock().unwrap().clone()
    }
}
