//! Travel-time matrix evaluation
//!
//! The full N×M matrix is computed eagerly in one engine call during
//! [`MatrixRequest::init`], then drained by a [`MatrixStream`] in fixed-size
//! columnar batches. Streaming never touches the engine or the session lock.

pub mod arrow_stream;

use tracing::debug;
use travel_time_common::{Error, Result};

use crate::engine::{CoordinateColumns, EngineLoader, MatrixEntry, Router};
use crate::session::RouterSession;

/// Default rows per emitted batch
pub const DEFAULT_BATCH_SIZE: usize = 2048;

/// Validated matrix arguments
#[derive(Debug, Clone)]
pub struct MatrixRequest {
    sources: CoordinateColumns,
    destinations: CoordinateColumns,
    profile: String,
}

impl MatrixRequest {
    /// Pair up source and destination columns. Source and destination
    /// counts may differ; each lat/lon pair must match.
    pub fn bind(
        src_lats: Vec<f64>,
        src_lons: Vec<f64>,
        dst_lats: Vec<f64>,
        dst_lons: Vec<f64>,
        profile: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            sources: CoordinateColumns::new(src_lats, src_lons, "Source")?,
            destinations: CoordinateColumns::new(dst_lats, dst_lons, "Destination")?,
            profile: profile.into(),
        })
    }

    pub fn sources(&self) -> &CoordinateColumns {
        &self.sources
    }

    pub fn destinations(&self) -> &CoordinateColumns {
        &self.destinations
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Cross-product size the engine may fill
    pub fn capacity(&self) -> usize {
        self.sources.len() * self.destinations.len()
    }

    /// Compute the matrix and return a stream over it
    pub fn init<L: EngineLoader>(
        &self,
        session: &RouterSession<L>,
        batch_size: usize,
    ) -> Result<MatrixStream> {
        if batch_size == 0 {
            return Err(Error::InvalidInput(
                "Matrix batch size must be positive".to_string(),
            ));
        }

        let mut entries = vec![MatrixEntry::default(); self.capacity()];
        let count = session.with_router(|router| {
            router.matrix(&self.sources, &self.destinations, &self.profile, &mut entries)
        })?;

        if count > entries.len() {
            return Err(Error::EngineRequest(format!(
                "Engine reported {count} matrix entries, only {} were provisioned",
                entries.len()
            )));
        }
        entries.truncate(count);

        debug!(
            sources = self.sources.len(),
            destinations = self.destinations.len(),
            entries = count,
            "Matrix computed"
        );
        Ok(MatrixStream::new(entries, batch_size))
    }
}

/// One emitted chunk of matrix rows, column-oriented
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatrixBatch {
    pub from_index: Vec<i32>,
    pub to_index: Vec<i32>,
    pub distance_m: Vec<f64>,
    pub duration_s: Vec<f64>,
}

impl MatrixBatch {
    fn from_entries(entries: &[MatrixEntry]) -> Self {
        Self {
            from_index: entries.iter().map(|e| e.from_index).collect(),
            to_index: entries.iter().map(|e| e.to_index).collect(),
            distance_m: entries.iter().map(|e| e.distance_m).collect(),
            duration_s: entries.iter().map(|e| e.duration_s).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.from_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.from_index.is_empty()
    }
}

/// Pull-based cursor over a precomputed matrix
#[derive(Debug)]
pub struct MatrixStream {
    entries: Vec<MatrixEntry>,
    cursor: usize,
    batch_size: usize,
    done: bool,
}

impl MatrixStream {
    fn new(entries: Vec<MatrixEntry>, batch_size: usize) -> Self {
        let done = entries.is_empty();
        Self {
            entries,
            cursor: 0,
            batch_size,
            done,
        }
    }

    /// Entries the engine returned
    pub fn entries(&self) -> &[MatrixEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rows not yet emitted
    pub fn remaining(&self) -> usize {
        self.entries.len() - self.cursor
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl Iterator for MatrixStream {
    type Item = MatrixBatch;

    fn next(&mut self) -> Option<MatrixBatch> {
        if self.done {
            return None;
        }

        let end = (self.cursor + self.batch_size).min(self.entries.len());
        let batch = MatrixBatch::from_entries(&self.entries[self.cursor..end]);
        self.cursor = end;
        self.done = self.cursor >= self.entries.len();
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let batches = if self.done {
            0
        } else {
            self.remaining().div_ceil(self.batch_size)
        };
        (batches, Some(batches))
    }
}
