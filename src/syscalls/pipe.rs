/*!
 * Pipe Provisioning
 * Descriptor pairs for captured streams
 */

use crate::core::types::{Fid, KernelResult};
use crate::fs::FileDescriptors;
use tracing::debug;

/// Both ends of a freshly allocated pipe in one descriptor table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipePair {
    pub read: Fid,
    pub write: Fid,
}

/// Allocate a pipe in `files`. Failure leaves the table unchanged.
pub fn provision_pipe(files: &FileDescriptors) -> KernelResult<PipePair> {
    let (read, write) = files.pipe()?;
    Ok(PipePair { read, write })
}

/// Closes every registered descriptor on drop unless disarmed
pub(crate) struct DescriptorGuard<'a> {
    files: &'a FileDescriptors,
    fids: Vec<Fid>,
}

impl<'a> DescriptorGuard<'a> {
    pub fn new(files: &'a FileDescriptors) -> Self {
        Self {
            files,
            fids: Vec::new(),
        }
    }

    pub fn track(&mut self, pair: PipePair) -> PipePair {
        self.fids.push(pair.read);
        self.fids.push(pair.write);
        pair
    }

    /// Close every tracked descriptor now, ignoring ones already closed
    pub fn close_all(&mut self) {
        for fid in self.fids.drain(..) {
            if self.files.close(fid).is_ok() {
                debug!(fid, "closed provisioned descriptor");
            }
        }
    }
}

impl Drop for DescriptorGuard<'_> {
    fn drop(&mut self) {
        self.close_all();
    }
}
