//! Bounded pool of readers for one archive.
//!
//! ZIP readers are not shareable (each owns a file cursor), so parallel reads
//! of one archive need several of them. The pool opens readers lazily up to
//! `max_readers`, hands each to one caller at a time and blocks further
//! callers until a reader is returned.
//!
//! # Lifecycle
//!
//! Pools live inside the archive-pool cache. When that cache evicts a pool it
//! calls [`ArchivePool::close`]: idle readers are dropped at once, readers
//! still checked out are dropped when their guard is released, and further
//! checkouts fail with [`ArchiveError::PoolClosed`].

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use super::reader::ArchiveReader;
use crate::error::ArchiveError;

#[derive(Debug, Default)]
struct PoolState {
    idle: Vec<ArchiveReader>,
    /// Readers currently checked out, plus slots reserved for readers being opened.
    outstanding: usize,
    opened: u64,
    closed: bool,
}

/// Bounded set of [`ArchiveReader`]s over one archive path.
#[derive(Debug)]
pub struct ArchivePool {
    path: PathBuf,
    max_readers: usize,
    state: Mutex<PoolState>,
    returned: Condvar,
}

impl ArchivePool {
    /// Creates an empty pool. No reader is opened until the first checkout.
    pub fn new(path: impl Into<PathBuf>, max_readers: usize) -> Self {
        Self {
            path: path.into(),
            max_readers: max_readers.max(1),
            state: Mutex::new(PoolState::default()),
            returned: Condvar::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_readers(&self) -> usize {
        self.max_readers
    }

    /// Takes a reader, opening one if the pool is below its bound.
    ///
    /// Blocks while all `max_readers` readers are checked out.
    pub fn checkout(&self) -> Result<PooledReader<'_>, ArchiveError> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(ArchiveError::PoolClosed {
                    path: self.path.clone(),
                });
            }
            if let Some(reader) = state.idle.pop() {
                state.outstanding += 1;
                trace!(archive = %self.path.display(), outstanding = state.outstanding, "Reused pooled reader");
                return Ok(PooledReader {
                    pool: self,
                    reader: Some(reader),
                });
            }
            if state.outstanding < self.max_readers {
                state.outstanding += 1;
                break;
            }
            trace!(archive = %self.path.display(), "Reader pool exhausted, waiting");
            self.returned.wait(&mut state);
        }
        drop(state);

        // Opened outside the lock; the slot is already reserved.
        match ArchiveReader::open(&self.path) {
            Ok(reader) => {
                self.state.lock().opened += 1;
                Ok(PooledReader {
                    pool: self,
                    reader: Some(reader),
                })
            }
            Err(e) => {
                self.state.lock().outstanding -= 1;
                self.returned.notify_one();
                Err(e)
            }
        }
    }

    /// Drops idle readers and refuses further checkouts.
    pub fn close(&self) {
        let idle = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            std::mem::take(&mut state.idle)
        };
        self.returned.notify_all();
        debug!(archive = %self.path.display(), idle = idle.len(), "Closed reader pool");
        drop(idle);
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Readers currently checked out.
    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding
    }

    /// Readers waiting in the pool.
    pub fn idle(&self) -> usize {
        self.state.lock().idle.len()
    }

    /// Total readers opened over the pool's lifetime.
    pub fn opened(&self) -> u64 {
        self.state.lock().opened
    }

    fn give_back(&self, reader: ArchiveReader) {
        let discarded = {
            let mut state = self.state.lock();
            state.outstanding -= 1;
            if state.closed {
                Some(reader)
            } else {
                state.idle.push(reader);
                None
            }
        };
        self.returned.notify_one();
        drop(discarded);
    }
}

impl Drop for ArchivePool {
    fn drop(&mut self) {
        self.close();
    }
}

/// A reader checked out of an [`ArchivePool`]; returned on drop.
#[derive(Debug)]
pub struct PooledReader<'p> {
    pool: &'p ArchivePool,
    reader: Option<ArchiveReader>,
}

impl Deref for PooledReader<'_> {
    type Target = ArchiveReader;

    fn deref(&self) -> &ArchiveReader {
        // Only `Drop` takes the reader out.
        self.reader.as_ref().unwrap_or_else(|| unreachable!("pooled reader already returned"))
    }
}

impl DerefMut for PooledReader<'_> {
    fn deref_mut(&mut self) -> &mut ArchiveReader {
        self.reader.as_mut().unwrap_or_else(|| unreachable!("pooled reader already returned"))
    }
}

impl Drop for PooledReader<'_> {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            self.pool.give_back(reader);
        }
    }
}
