/*!
 * Open File Descriptions
 *
 * The object a descriptor points at. `dup`, `dup2` and child attachment share
 * one `Arc<OpenFile>`; the description closes when the last reference drops,
 * which is what releases pipe ends (EOF / broken pipe) and advisory locks.
 */

use super::lock::{AdvisoryLock, LockAction, LockError, LockMode};
use super::node::Node;
use crate::core::errors::KernelError;
use crate::core::types::{Fid, KernelResult, OpenFileId, Size};
use crate::ipc::pipe::{self, PipeReader, PipeStats, PipeWriter};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_OPEN_FILE_ID: AtomicU64 = AtomicU64::new(1);

fn next_open_file_id() -> OpenFileId {
    NEXT_OPEN_FILE_ID.fetch_add(1, Ordering::Relaxed)
}

/// What an open file description streams from or to
#[derive(Debug)]
pub enum Stream {
    /// Discards writes, reads EOF
    Null,
    PipeRead(PipeReader),
    PipeWrite(PipeWriter),
    Node {
        node: Arc<Node>,
        offset: Mutex<usize>,
    },
}

#[derive(Debug)]
pub struct OpenFile {
    id: OpenFileId,
    stream: Stream,
    lock: Arc<AdvisoryLock>,
}

impl OpenFile {
    pub fn null() -> Arc<Self> {
        Arc::new(Self {
            id: next_open_file_id(),
            stream: Stream::Null,
            lock: Arc::new(AdvisoryLock::new()),
        })
    }

    /// Both ends of a fresh pipe; they lock the same object
    pub fn pipe(capacity: Size) -> (Arc<Self>, Arc<Self>) {
        let (reader, writer) = pipe::channel(capacity);
        let lock = Arc::new(AdvisoryLock::new());
        (
            Arc::new(Self {
                id: next_open_file_id(),
                stream: Stream::PipeRead(reader),
                lock: Arc::clone(&lock),
            }),
            Arc::new(Self {
                id: next_open_file_id(),
                stream: Stream::PipeWrite(writer),
                lock,
            }),
        )
    }

    pub fn node(node: Arc<Node>) -> Arc<Self> {
        let lock = node.lock();
        Arc::new(Self {
            id: next_open_file_id(),
            stream: Stream::Node {
                node,
                offset: Mutex::new(0),
            },
            lock,
        })
    }

    pub fn id(&self) -> OpenFileId {
        self.id
    }

    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    pub fn kind(&self) -> &'static str {
        match self.stream {
            Stream::Null => "null",
            Stream::PipeRead(_) => "pipe_read",
            Stream::PipeWrite(_) => "pipe_write",
            Stream::Node { .. } => "node",
        }
    }

    pub fn is_readable(&self) -> bool {
        !matches!(self.stream, Stream::PipeWrite(_))
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self.stream, Stream::PipeRead(_))
    }

    pub fn pipe_stats(&self) -> Option<PipeStats> {
        match &self.stream {
            Stream::PipeRead(r) => Some(r.stats()),
            Stream::PipeWrite(w) => Some(w.stats()),
            _ => None,
        }
    }

    /// Read into `buf`; `Ok(0)` means end-of-stream
    pub async fn read(&self, buf: &mut [u8]) -> KernelResult<Size> {
        match &self.stream {
            Stream::Null => Ok(0),
            Stream::PipeRead(reader) => Ok(reader.read(buf).await?),
            Stream::PipeWrite(_) => Err(KernelError::StreamRead(
                "pipe write end is not readable".into(),
            )),
            Stream::Node { node, offset } => {
                let mut offset = offset.lock();
                let n = node.read_at(*offset, buf);
                *offset += n;
                Ok(n)
            }
        }
    }

    pub async fn write(&self, data: &[u8]) -> KernelResult<Size> {
        match &self.stream {
            Stream::Null => Ok(data.len()),
            Stream::PipeWrite(writer) => Ok(writer.write(data).await?),
            Stream::PipeRead(_) => Err(KernelError::Io("pipe read end is not writable".into())),
            Stream::Node { node, offset } => {
                let mut offset = offset.lock();
                let n = node.write_at(*offset, data);
                *offset += n;
                Ok(n)
            }
        }
    }

    pub async fn write_all(&self, mut data: &[u8]) -> KernelResult<()> {
        while !data.is_empty() {
            let n = self.write(data).await?;
            data = &data[n..];
        }
        Ok(())
    }

    /// Apply an advisory lock action owned by this description
    pub async fn flock(&self, action: LockAction, mode: LockMode) -> Result<(), LockError> {
        self.lock.apply(self.id, action, mode).await
    }
}

impl Drop for OpenFile {
    fn drop(&mut self) {
        self.lock.release(self.id);
    }
}

/// Readable handle detached from the descriptor table.
///
/// Keeps the open file description alive independently of the descriptor it
/// came from, so the descriptor may be closed while the reader drains.
#[derive(Debug)]
pub struct RawReader {
    fid: Fid,
    file: Arc<OpenFile>,
    eof: bool,
}

impl RawReader {
    pub(crate) fn new(fid: Fid, file: Arc<OpenFile>) -> Self {
        Self {
            fid,
            file,
            eof: false,
        }
    }

    pub fn fid(&self) -> Fid {
        self.fid
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Read into `buf`. Once end-of-stream was observed every later call
    /// returns `Ok(0)` without touching the stream.
    pub async fn read(&mut self, buf: &mut [u8]) -> KernelResult<Size> {
        if self.eof {
            return Ok(0);
        }
        let n = self.file.read(buf).await?;
        if n == 0 && !buf.is_empty() {
            self.eof = true;
        }
        Ok(n)
    }

    pub async fn read_to_end(&mut self) -> KernelResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }
}

/// Writable handle detached from the descriptor table
#[derive(Debug, Clone)]
pub struct RawWriter {
    fid: Fid,
    file: Arc<OpenFile>,
}

impl RawWriter {
    pub(crate) fn new(fid: Fid, file: Arc<OpenFile>) -> Self {
        Self { fid, file }
    }

    pub fn fid(&self) -> Fid {
        self.fid
    }

    pub async fn write(&self, data: &[u8]) -> KernelResult<Size> {
        self.file.write(data).await
    }

    pub async fn write_all(&self, data: &[u8]) -> KernelResult<()> {
        self.file.write_all(data).await
    }
}
