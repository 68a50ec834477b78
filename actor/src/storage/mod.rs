//! Storage backend for the training dataset.
//!
//! This module provides the line-oriented file store that self-play
//! appends datapoints to.
//!
//! # Usage
//!
//! ```rust,ignore
//! use actor::storage::{DatasetStore, LineStore};
//!
//! let mut store = LineStore::open("data/dataset.txt")?;
//! for datapoint in &datapoints {
//!     store.store(datapoint)?;
//! }
//! store.constrain(500_000);
//! store.apply_changes()?;
//! ```

mod lines;

pub use lines::LineStore;

use anyhow::Result;
use mcts::Datapoint;

/// Abstract interface for dataset storage.
///
/// Changes are buffered in memory until [`DatasetStore::apply_changes`].
pub trait DatasetStore {
    /// Append a datapoint
    fn store(&mut self, datapoint: &Datapoint) -> Result<()>;

    /// Number of stored datapoints
    fn count(&self) -> usize;

    /// Datapoint at `index`, oldest first
    fn get(&self, index: usize) -> Option<&Datapoint>;

    /// Remove the datapoint at `index`
    #[cfg_attr(not(test), allow(dead_code))]
    fn delete(&mut self, index: usize) -> Result<()>;

    /// Drop the oldest datapoints until at most `max` remain. Returns how
    /// many were dropped.
    fn constrain(&mut self, max: usize) -> usize;

    /// Persist buffered changes
    fn apply_changes(&mut self) -> Result<()>;
}
