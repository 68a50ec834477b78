//! Plain-text dataset file, one datapoint per line.
//!
//! Lines use the `m1,m2,...;best;winner` format of [`Datapoint`].

use anyhow::{anyhow, Context, Result};
use mcts::Datapoint;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::DatasetStore;

/// File-backed dataset held fully in memory.
#[derive(Debug)]
pub struct LineStore {
    path: PathBuf,
    records: Vec<Datapoint>,
    dirty: bool,
}

impl LineStore {
    /// Open `path`, reading its datapoints if the file exists.
    ///
    /// A malformed line is an error naming the file and line number.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut records = Vec::new();

        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            for (i, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let datapoint = line
                    .parse::<Datapoint>()
                    .with_context(|| format!("{}:{}: malformed datapoint", path.display(), i + 1))?;
                records.push(datapoint);
            }
            info!(path = %path.display(), records = records.len(), "opened dataset");
        } else {
            debug!(path = %path.display(), "dataset does not exist yet");
        }

        Ok(Self {
            path,
            records,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when there are changes not yet written.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn write_all(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }

        let file = fs::File::create(&self.path)
            .with_context(|| format!("failed to create {}", self.path.display()))?;
        let mut writer = BufWriter::new(file);
        for datapoint in &self.records {
            writeln!(writer, "{datapoint}")?;
        }
        writer
            .flush()
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}

impl DatasetStore for LineStore {
    fn store(&mut self, datapoint: &Datapoint) -> Result<()> {
        self.records.push(datapoint.clone());
        self.dirty = true;
        Ok(())
    }

    fn count(&self) -> usize {
        self.records.len()
    }

    fn get(&self, index: usize) -> Option<&Datapoint> {
        self.records.get(index)
    }

    fn delete(&mut self, index: usize) -> Result<()> {
        if index >= self.records.len() {
            return Err(anyhow!(
                "datapoint {index} out of range ({} stored)",
                self.records.len()
            ));
        }
        self.records.remove(index);
        self.dirty = true;
        Ok(())
    }

    fn constrain(&mut self, max: usize) -> usize {
        let excess = self.records.len().saturating_sub(max);
        if excess > 0 {
            self.records.drain(..excess);
            self.dirty = true;
            debug!(dropped = excess, kept = self.records.len(), "constrained dataset");
        }
        excess
    }

    fn apply_changes(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.write_all()?;
        self.dirty = false;
        debug!(path = %self.path.display(), records = self.records.len(), "dataset written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn point(moves: &[u16], best: u16, winner: u8) -> Datapoint {
        Datapoint {
            moves: moves.to_vec(),
            best_move: best,
            winner,
        }
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = LineStore::open(dir.path().join("dataset.txt")).unwrap();
        assert_eq!(store.count(), 0);
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_store_and_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("dataset.txt");

        let mut store = LineStore::open(&path).unwrap();
        store.store(&point(&[112, 113], 97, 1)).unwrap();
        store.store(&point(&[], 112, 2)).unwrap();
        store.apply_changes().unwrap();
        assert!(!store.is_dirty());

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "112,113;97;1\n;112;2\n");

        let reopened = LineStore::open(&path).unwrap();
        assert_eq!(reopened.count(), 2);
        assert_eq!(reopened.get(0), Some(&point(&[112, 113], 97, 1)));
        assert_eq!(reopened.get(1), Some(&point(&[], 112, 2)));
        assert_eq!(reopened.get(2), None);
    }

    #[test]
    fn test_apply_changes_without_changes_leaves_file_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dataset.txt");
        fs::write(&path, "1,2;3;0\n\n").unwrap();

        let mut store = LineStore::open(&path).unwrap();
        assert_eq!(store.count(), 1);
        store.apply_changes().unwrap();

        // The blank line would have been dropped by a rewrite
        assert_eq!(fs::read_to_string(&path).unwrap(), "1,2;3;0\n\n");
    }

    #[test]
    fn test_constrain_drops_oldest() {
        let dir = tempdir().unwrap();
        let mut store = LineStore::open(dir.path().join("dataset.txt")).unwrap();
        for best in 0..5 {
            store.store(&point(&[], best, 0)).unwrap();
        }

        assert_eq!(store.constrain(10), 0);
        assert_eq!(store.constrain(3), 2);
        assert_eq!(store.count(), 3);
        assert_eq!(store.get(0).map(|d| d.best_move), Some(2));
        assert_eq!(store.get(2).map(|d| d.best_move), Some(4));
    }

    #[test]
    fn test_apply_changes_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dataset.txt");
        fs::write(&path, "1;2;0\n3;4;1\n5;6;2\n").unwrap();

        let mut store = LineStore::open(&path).unwrap();
        store.constrain(1);
        store.apply_changes().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "5;6;2\n");
    }

    #[test]
    fn test_delete() {
        let dir = tempdir().unwrap();
        let mut store = LineStore::open(dir.path().join("dataset.txt")).unwrap();
        store.store(&point(&[1], 2, 0)).unwrap();
        store.store(&point(&[3], 4, 1)).unwrap();

        store.delete(0).unwrap();
        assert_eq!(store.count(), 1);
        assert_eq!(store.get(0), Some(&point(&[3], 4, 1)));
        assert!(store.delete(5).is_err());
    }

    #[test]
    fn test_malformed_line_names_location() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dataset.txt");
        fs::write(&path, "1;2;0\n1;x;0\n").unwrap();

        let err = LineStore::open(&path).unwrap_err();
        assert!(format!("{err}").contains(":2: malformed datapoint"));
    }
}
