//! Lazy single level directory enumeration.

use std::fs::ReadDir;
use std::path::{Path, PathBuf};

use anyhow::{format_err, Error};

use super::task::IndexBatch;

/// One step of a directory enumeration.
#[derive(Debug)]
pub enum DirEvent {
    /// A child directory, to be indexed by a task of its own.
    SubDir(PathBuf),
    /// A bounded group of plain files directly under the directory.
    Batch(IndexBatch),
}

/// Iterates one directory without descending.
///
/// Child directories are yielded one by one; anything that is not a
/// directory accumulates into batches of at most `max_index_size`
/// entries. A file arriving at a full batch flushes it and opens the
/// next batch, so a full flush carries exactly `max_index_size` entries
/// and the trigger file moves into the following batch. A final partial
/// batch is yielded when the listing ends.
pub struct DirIterator {
    dir: PathBuf,
    nfs_cluster: String,
    max_index_size: usize,
    entries: ReadDir,
    files: Vec<String>,
    size: u64,
    done: bool,
}

impl DirIterator {
    pub fn open(dir: &Path, nfs_cluster: &str, max_index_size: usize) -> Result<Self, Error> {
        let entries = std::fs::read_dir(dir)
            .map_err(|err| format_err!("unable to read directory {:?} - {}", dir, err))?;
        Ok(Self {
            dir: dir.to_owned(),
            nfs_cluster: nfs_cluster.to_string(),
            max_index_size: max_index_size.max(1),
            entries,
            files: Vec::new(),
            size: 0,
            done: false,
        })
    }

    fn flush(&mut self, files: Vec<String>, size: u64) -> IndexBatch {
        let files = std::mem::replace(&mut self.files, files);
        let size = std::mem::replace(&mut self.size, size);
        IndexBatch {
            dir: self.dir.to_string_lossy().to_string(),
            files,
            size,
            nfs_cluster: self.nfs_cluster.clone(),
        }
    }
}

impl Iterator for DirIterator {
    type Item = Result<DirEvent, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let entry = match self.entries.next() {
                Some(Ok(entry)) => entry,
                Some(Err(err)) => return Some(Err(err.into())),
                None => {
                    self.done = true;
                    if self.files.is_empty() {
                        return None;
                    }
                    let batch = self.flush(Vec::new(), 0);
                    return Some(Ok(DirEvent::Batch(batch)));
                }
            };

            let path = self.dir.join(entry.file_name());
            // Symlinks and special files count as files whenever the
            // directory check says no.
            if path.is_dir() {
                return Some(Ok(DirEvent::SubDir(path)));
            }

            let size = match path.metadata() {
                Ok(metadata) => metadata.len(),
                Err(err) => return Some(Err(format_err!("stat {:?} failed: {}", path, err))),
            };

            let name = entry.file_name().to_string_lossy().to_string();
            if self.files.len() == self.max_index_size {
                let batch = self.flush(vec![name], size);
                return Some(Ok(DirEvent::Batch(batch)));
            }
            self.files.push(name);
            self.size += size;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn events(dir: &Path, max_index_size: usize) -> Vec<DirEvent> {
        DirIterator::open(dir, "cluster", max_index_size)
            .unwrap()
            .map(|event| event.unwrap())
            .collect()
    }

    fn batches(events: &[DirEvent]) -> Vec<&IndexBatch> {
        events
            .iter()
            .filter_map(|event| match event {
                DirEvent::Batch(batch) => Some(batch),
                DirEvent::SubDir(_) => None,
            })
            .collect()
    }

    #[test]
    fn empty_directory_yields_nothing() -> Result<(), Error> {
        let scratch = tempfile::tempdir()?;
        assert!(events(scratch.path(), 5).is_empty());
        Ok(())
    }

    #[test]
    fn exactly_max_files_fill_one_batch() -> Result<(), Error> {
        let scratch = tempfile::tempdir()?;
        for i in 0..5 {
            fs::write(scratch.path().join(format!("f{}", i)), b"x")?;
        }

        let events = events(scratch.path(), 5);
        let batches = batches(&events);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].files.len(), 5);
        assert_eq!(batches[0].size, 5);
        assert_eq!(batches[0].nfs_cluster, "cluster");
        Ok(())
    }

    #[test]
    fn threshold_crossing_file_opens_the_next_batch() -> Result<(), Error> {
        let scratch = tempfile::tempdir()?;
        for i in 0..6 {
            fs::write(scratch.path().join(format!("f{}", i)), b"x")?;
        }

        let events = events(scratch.path(), 5);
        let batches = batches(&events);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].files.len(), 5);
        assert_eq!(batches[1].files.len(), 1);
        Ok(())
    }

    #[test]
    fn subdirs_are_yielded_individually() -> Result<(), Error> {
        let scratch = tempfile::tempdir()?;
        fs::create_dir(scratch.path().join("sub1"))?;
        fs::create_dir(scratch.path().join("sub2"))?;
        fs::write(scratch.path().join("f1"), b"data")?;

        let events = events(scratch.path(), 5);
        let subdirs = events
            .iter()
            .filter(|event| matches!(event, DirEvent::SubDir(_)))
            .count();
        assert_eq!(subdirs, 2);

        let batches = batches(&events);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].files, vec!["f1".to_string()]);
        assert_eq!(batches[0].size, 4);
        Ok(())
    }
}
