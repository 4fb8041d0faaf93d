/*!
 * In-Memory Nodes
 * Minimal named files shared by every descriptor table of a kernel
 */

use super::lock::AdvisoryLock;
use crate::core::errors::KernelError;
use crate::core::types::KernelResult;
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A named in-memory file
#[derive(Debug)]
pub struct Node {
    id: u64,
    path: String,
    data: RwLock<Vec<u8>>,
    lock: Arc<AdvisoryLock>,
}

impl Node {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contents(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    pub(crate) fn lock(&self) -> Arc<AdvisoryLock> {
        Arc::clone(&self.lock)
    }

    /// Copy bytes starting at `offset` into `buf`
    pub(crate) fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize {
        let data = self.data.read();
        if offset >= data.len() {
            return 0;
        }
        let n = buf.len().min(data.len() - offset);
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        n
    }

    /// Overwrite/extend starting at `offset`
    pub(crate) fn write_at(&self, offset: usize, bytes: &[u8]) -> usize {
        let mut data = self.data.write();
        let end = offset + bytes.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[offset..end].copy_from_slice(bytes);
        bytes.len()
    }
}

/// Path → node registry
#[derive(Debug, Clone)]
pub struct NodeTable {
    nodes: Arc<DashMap<String, Arc<Node>, RandomState>>,
    next_id: Arc<AtomicU64>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self {
            nodes: Arc::new(DashMap::with_hasher(RandomState::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Look up `path`, creating an empty node when `create` is set
    pub fn open(&self, path: &str, create: bool) -> KernelResult<Arc<Node>> {
        if let Some(node) = self.nodes.get(path) {
            return Ok(Arc::clone(node.value()));
        }
        if !create {
            return Err(KernelError::Io(format!("{}: no such file", path).into()));
        }

        let node = self
            .nodes
            .entry(path.to_string())
            .or_insert_with(|| {
                Arc::new(Node {
                    id: self.next_id.fetch_add(1, Ordering::Relaxed),
                    path: path.to_string(),
                    data: RwLock::new(Vec::new()),
                    lock: Arc::new(AdvisoryLock::new()),
                })
            })
            .value()
            .clone();
        Ok(node)
    }

    /// Create or replace the contents of `path`
    pub fn put(&self, path: &str, contents: impl Into<Vec<u8>>) -> KernelResult<Arc<Node>> {
        let node = self.open(path, true)?;
        *node.data.write() = contents.into();
        Ok(node)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for NodeTable {
    fn default() -> Self {
        Self::new()
    }
}
