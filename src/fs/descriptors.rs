/*!
 * File Descriptor Table
 *
 * Per-process table mapping descriptor numbers to shared open file
 * descriptions. Independent descriptors can be used concurrently from any
 * task; the table lock is only held for map updates, never across I/O.
 */

use super::lock::{LockAction, LockMode};
use super::node::NodeTable;
use super::open_file::{OpenFile, RawReader, RawWriter};
use crate::core::config::KernelConfig;
use crate::core::errors::KernelError;
use crate::core::types::{Fid, KernelResult, Size};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
struct Table {
    entries: RwLock<BTreeMap<Fid, Arc<OpenFile>>>,
    max_descriptors: usize,
    pipe_capacity: Size,
    lock_wait_timeout: Duration,
    nodes: NodeTable,
}

/// Virtual descriptor table; clones share the same table
#[derive(Debug, Clone)]
pub struct FileDescriptors {
    table: Arc<Table>,
}

impl FileDescriptors {
    pub fn new(config: &KernelConfig, nodes: NodeTable) -> Self {
        Self {
            table: Arc::new(Table {
                entries: RwLock::new(BTreeMap::new()),
                max_descriptors: config.max_descriptors,
                pipe_capacity: config.pipe_capacity,
                lock_wait_timeout: config.lock_wait_timeout,
                nodes,
            }),
        }
    }

    /// Empty table with the same limits and node namespace, for a child process
    pub fn empty_like(&self) -> Self {
        Self {
            table: Arc::new(Table {
                entries: RwLock::new(BTreeMap::new()),
                max_descriptors: self.table.max_descriptors,
                pipe_capacity: self.table.pipe_capacity,
                lock_wait_timeout: self.table.lock_wait_timeout,
                nodes: self.table.nodes.clone(),
            }),
        }
    }

    pub fn nodes(&self) -> &NodeTable {
        &self.table.nodes
    }

    /// Place `file` at the lowest free descriptor
    pub fn insert(&self, file: Arc<OpenFile>) -> KernelResult<Fid> {
        let mut entries = self.table.entries.write();
        let fid = lowest_free(&entries, self.table.max_descriptors)?;
        entries.insert(fid, file);
        Ok(fid)
    }

    /// Place `file` at `fid`, closing whatever was there
    pub fn install(&self, fid: Fid, file: Arc<OpenFile>) -> KernelResult<()> {
        if fid as usize >= self.table.max_descriptors {
            return Err(KernelError::BadDescriptor(fid));
        }
        let previous = self.table.entries.write().insert(fid, file);
        // Dropped outside the table lock; may release pipe ends and locks
        drop(previous);
        Ok(())
    }

    pub fn get(&self, fid: Fid) -> KernelResult<Arc<OpenFile>> {
        self.table
            .entries
            .read()
            .get(&fid)
            .cloned()
            .ok_or(KernelError::BadDescriptor(fid))
    }

    pub fn contains(&self, fid: Fid) -> bool {
        self.table.entries.read().contains_key(&fid)
    }

    /// Allocate a connected pipe, returning `(read_end, write_end)`
    pub fn pipe(&self) -> KernelResult<(Fid, Fid)> {
        let (reader, writer) = OpenFile::pipe(self.table.pipe_capacity);

        let mut entries = self.table.entries.write();
        let read_fid = lowest_free(&entries, self.table.max_descriptors)?;
        entries.insert(read_fid, reader);
        let write_fid = match lowest_free(&entries, self.table.max_descriptors) {
            Ok(fid) => fid,
            Err(e) => {
                let reader = entries.remove(&read_fid);
                drop(entries);
                drop(reader);
                return Err(e);
            }
        };
        entries.insert(write_fid, writer);

        debug!(read_fid, write_fid, "pipe allocated");
        Ok((read_fid, write_fid))
    }

    /// Open an in-memory node by path
    pub fn open(&self, path: &str, create: bool) -> KernelResult<Fid> {
        let node = self.table.nodes.open(path, create)?;
        self.insert(OpenFile::node(node))
    }

    pub fn close(&self, fid: Fid) -> KernelResult<()> {
        let removed = self.table.entries.write().remove(&fid);
        match removed {
            Some(file) => {
                drop(file);
                Ok(())
            }
            None => Err(KernelError::BadDescriptor(fid)),
        }
    }

    /// Close every descriptor in the table
    pub fn close_all(&self) {
        let entries = std::mem::take(&mut *self.table.entries.write());
        drop(entries);
    }

    /// Duplicate onto the lowest free descriptor
    pub fn dup(&self, fid: Fid) -> KernelResult<Fid> {
        let file = self.get(fid)?;
        self.insert(file)
    }

    /// Duplicate `old` onto `new`, closing `new` first if open
    pub fn dup2(&self, old: Fid, new: Fid) -> KernelResult<Fid> {
        let file = self.get(old)?;
        if old != new {
            self.install(new, file)?;
        }
        Ok(new)
    }

    pub fn raw_reader(&self, fid: Fid) -> KernelResult<RawReader> {
        let file = self.get(fid)?;
        if !file.is_readable() {
            return Err(KernelError::BadDescriptor(fid));
        }
        Ok(RawReader::new(fid, file))
    }

    pub fn raw_writer(&self, fid: Fid) -> KernelResult<RawWriter> {
        let file = self.get(fid)?;
        if !file.is_writable() {
            return Err(KernelError::BadDescriptor(fid));
        }
        Ok(RawWriter::new(fid, file))
    }

    /// Apply an advisory lock action to the open file behind `fid`.
    ///
    /// Blocking requests wait at most the configured lock timeout.
    pub async fn flock(
        &self,
        fid: Fid,
        action: LockAction,
        non_blocking: bool,
    ) -> KernelResult<()> {
        let file = self.get(fid)?;
        let mode = if non_blocking {
            LockMode::NonBlocking
        } else {
            LockMode::Blocking(self.table.lock_wait_timeout)
        };
        file.flock(action, mode).await?;
        Ok(())
    }

    pub fn fids(&self) -> Vec<Fid> {
        self.table.entries.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.table.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lowest_free(entries: &BTreeMap<Fid, Arc<OpenFile>>, max: usize) -> KernelResult<Fid> {
    let mut candidate: Fid = 0;
    for &fid in entries.keys() {
        if fid != candidate {
            break;
        }
        candidate += 1;
    }
    if candidate as usize >= max {
        return Err(KernelError::resource_exhausted(format!(
            "descriptor table full ({} open)",
            entries.len()
        )));
    }
    Ok(candidate)
}
