/*!
 * Output Aggregation
 *
 * One drain task per captured stream reads its pipe end in small chunks and
 * forwards them over a channel; a single aggregator owns the capture buffers
 * and appends each chunk in arrival order. A drain stops at end-of-stream or
 * on the first read error, releasing its read end either way.
 *
 * The channel is unbounded: a drain never waits on the aggregator, so a
 * child writing more than the pipe holds keeps making progress.
 */

use crate::core::data_structures::InlineString;
use crate::fs::RawReader;
use bytes::{Bytes, BytesMut};
use std::fmt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainEvent {
    Chunk(Bytes),
    Eof,
    /// The stream failed before end-of-stream
    Truncated(InlineString),
}

pub type DrainSender = mpsc::UnboundedSender<(StreamKind, DrainEvent)>;

/// Channel pair connecting drains to an aggregator
pub fn channel() -> (DrainSender, Aggregator) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, Aggregator::new(rx))
}

/// Spawn a task draining `reader` into `tx`
pub fn spawn_drain(
    kind: StreamKind,
    reader: RawReader,
    tx: DrainSender,
    chunk_size: usize,
) -> JoinHandle<()> {
    tokio::spawn(drain(kind, reader, tx, chunk_size).in_current_span())
}

async fn drain(kind: StreamKind, mut reader: RawReader, tx: DrainSender, chunk_size: usize) {
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total = 0usize;
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                debug!(stream = %kind, bytes = total, "end of stream");
                let _ = tx.send((kind, DrainEvent::Eof));
                return;
            }
            Ok(n) => {
                total += n;
                let chunk = Bytes::copy_from_slice(&buf[..n]);
                if tx.send((kind, DrainEvent::Chunk(chunk))).is_err() {
                    debug!(stream = %kind, "aggregator gone, stopping drain");
                    return;
                }
            }
            Err(e) => {
                warn!(stream = %kind, fid = reader.fid(), error = %e, "read failed, output truncated");
                let _ = tx.send((kind, DrainEvent::Truncated(e.to_string().into())));
                return;
            }
        }
    }
}

#[derive(Debug, Default)]
struct Capture {
    buf: BytesMut,
    done: bool,
    truncated: bool,
}

impl Capture {
    fn apply(&mut self, event: DrainEvent) {
        if self.done {
            return;
        }
        match event {
            DrainEvent::Chunk(bytes) => self.buf.extend_from_slice(&bytes),
            DrainEvent::Eof => self.done = true,
            DrainEvent::Truncated(_) => {
                self.done = true;
                self.truncated = true;
            }
        }
    }
}

/// Captured bytes of both streams
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    pub stdout: Bytes,
    pub stderr: Bytes,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
}

/// Sole owner of the capture buffers
#[derive(Debug)]
pub struct Aggregator {
    rx: mpsc::UnboundedReceiver<(StreamKind, DrainEvent)>,
    stdout: Capture,
    stderr: Capture,
}

impl Aggregator {
    fn new(rx: mpsc::UnboundedReceiver<(StreamKind, DrainEvent)>) -> Self {
        Self {
            rx,
            stdout: Capture::default(),
            stderr: Capture::default(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.stdout.done && self.stderr.done
    }

    /// Apply events until both streams are finished.
    ///
    /// Cancel safe: state lives in `self`, so a timed-out call keeps
    /// everything received so far.
    pub async fn run(&mut self) {
        while !self.is_complete() {
            match self.rx.recv().await {
                Some((kind, event)) => self.apply(kind, event),
                None => {
                    // Every drain is gone; whatever has no end marker is cut short
                    for capture in [&mut self.stdout, &mut self.stderr] {
                        capture.apply(DrainEvent::Truncated("drain stopped".into()));
                    }
                }
            }
        }
    }

    fn apply(&mut self, kind: StreamKind, event: DrainEvent) {
        match kind {
            StreamKind::Stdout => self.stdout.apply(event),
            StreamKind::Stderr => self.stderr.apply(event),
        }
    }

    /// Hand out the buffers; unfinished streams are flagged truncated
    pub fn finish(self) -> Captured {
        Captured {
            stdout_truncated: self.stdout.truncated || !self.stdout.done,
            stderr_truncated: self.stderr.truncated || !self.stderr.done,
            stdout: self.stdout.buf.freeze(),
            stderr: self.stderr.buf.freeze(),
        }
    }
}
