/*!
 * Pipe Implementation
 * Core pipe data structure with ringbuf-based circular buffer
 */

use super::types::{PipeError, PipeId, PipeStats, MAX_PIPE_CAPACITY};
use crate::core::types::Size;
use parking_lot::Mutex;
use ringbuf::{traits::*, HeapRb};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

static NEXT_PIPE_ID: AtomicU32 = AtomicU32::new(1);

struct Shared {
    id: PipeId,
    buffer: Mutex<HeapRb<u8>>,
    capacity: Size,
    readers: AtomicUsize,
    writers: AtomicUsize,
    /// Signalled on new data and when the last writer leaves
    readable: Notify,
    /// Signalled on freed space and when the last reader leaves
    writable: Notify,
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipe")
            .field("id", &self.id)
            .field("buffered_bytes", &self.buffer.lock().occupied_len())
            .field("capacity", &self.capacity)
            .field("readers", &self.readers.load(Ordering::Relaxed))
            .field("writers", &self.writers.load(Ordering::Relaxed))
            .finish()
    }
}

impl Shared {
    fn stats(&self) -> PipeStats {
        PipeStats {
            id: self.id,
            capacity: self.capacity,
            buffered: self.buffer.lock().occupied_len(),
            readers: self.readers.load(Ordering::Acquire),
            writers: self.writers.load(Ordering::Acquire),
        }
    }
}

/// Create a connected pipe and return its two ends
pub fn channel(capacity: Size) -> (PipeReader, PipeWriter) {
    let capacity = capacity.clamp(1, MAX_PIPE_CAPACITY);
    let shared = Arc::new(Shared {
        id: NEXT_PIPE_ID.fetch_add(1, Ordering::Relaxed),
        buffer: Mutex::new(HeapRb::<u8>::new(capacity)),
        capacity,
        readers: AtomicUsize::new(1),
        writers: AtomicUsize::new(1),
        readable: Notify::new(),
        writable: Notify::new(),
    });

    (
        PipeReader {
            shared: Arc::clone(&shared),
        },
        PipeWriter { shared },
    )
}

/// Read end of a pipe
#[derive(Debug)]
pub struct PipeReader {
    shared: Arc<Shared>,
}

impl PipeReader {
    pub fn id(&self) -> PipeId {
        self.shared.id
    }

    pub fn stats(&self) -> PipeStats {
        self.shared.stats()
    }

    /// Read up to `buf.len()` bytes, waiting for data.
    ///
    /// Returns `Ok(0)` once the buffer is drained and every write end is closed.
    pub async fn read(&self, buf: &mut [u8]) -> Result<Size, PipeError> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            // Registered before the check so a wakeup between check and await is not lost
            let readable = self.shared.readable.notified();

            match self.try_read(buf) {
                Err(e) if e.would_block() => readable.await,
                other => return other,
            }
        }
    }

    /// Non-blocking read
    pub fn try_read(&self, buf: &mut [u8]) -> Result<Size, PipeError> {
        let mut buffer = self.shared.buffer.lock();

        if buffer.is_empty() {
            if self.shared.writers.load(Ordering::Acquire) == 0 {
                return Ok(0); // EOF
            }
            return Err(PipeError::Empty(self.shared.id));
        }

        let read = buffer.pop_slice(buf);
        drop(buffer);

        self.shared.writable.notify_waiters();
        Ok(read)
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        if self.shared.readers.fetch_sub(1, Ordering::AcqRel) == 1 {
            // Blocked writers must observe the broken pipe
            self.shared.writable.notify_waiters();
        }
    }
}

/// Write end of a pipe
#[derive(Debug)]
pub struct PipeWriter {
    shared: Arc<Shared>,
}

impl PipeWriter {
    pub fn id(&self) -> PipeId {
        self.shared.id
    }

    pub fn stats(&self) -> PipeStats {
        self.shared.stats()
    }

    /// Write as much of `data` as fits, waiting for space if the buffer is full
    pub async fn write(&self, data: &[u8]) -> Result<Size, PipeError> {
        if data.is_empty() {
            return Ok(0);
        }

        loop {
            let writable = self.shared.writable.notified();

            match self.try_write(data) {
                Err(e) if e.would_block() => writable.await,
                other => return other,
            }
        }
    }

    /// Write the whole slice, waiting as often as needed
    pub async fn write_all(&self, mut data: &[u8]) -> Result<(), PipeError> {
        while !data.is_empty() {
            let written = self.write(data).await?;
            data = &data[written..];
        }
        Ok(())
    }

    /// Non-blocking write
    pub fn try_write(&self, data: &[u8]) -> Result<Size, PipeError> {
        if self.shared.readers.load(Ordering::Acquire) == 0 {
            return Err(PipeError::Broken(self.shared.id));
        }

        let mut buffer = self.shared.buffer.lock();
        if buffer.vacant_len() == 0 {
            return Err(PipeError::Full(self.shared.id));
        }

        let written = buffer.push_slice(data);
        drop(buffer);

        self.shared.readable.notify_waiters();
        Ok(written)
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        if self.shared.writers.fetch_sub(1, Ordering::AcqRel) == 1 {
            // Blocked readers must observe EOF
            self.shared.readable.notify_waiters();
        }
    }
}
