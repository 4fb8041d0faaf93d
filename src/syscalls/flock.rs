/*!
 * Advisory Lock Dispatch
 * Decodes flock action codes and applies them to the caller's descriptors
 */

use super::executor::SyscallExecutor;
use crate::core::errors::KernelError;
use crate::core::types::{Fid, KernelResult};
use crate::fs::LockAction;
use crate::monitoring::span_syscall;
use tracing::{debug, Instrument};

/// Shared lock
pub const LOCK_SH: i32 = 1;
/// Exclusive lock
pub const LOCK_EX: i32 = 2;
/// Modifier: fail instead of waiting
pub const LOCK_NB: i32 = 4;
/// Release
pub const LOCK_UN: i32 = 8;

/// A decoded flock request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRequest {
    pub fid: Fid,
    pub action: LockAction,
    pub non_blocking: bool,
}

impl LockRequest {
    /// Split `code` into its base action and the `LOCK_NB` modifier.
    /// Any other bit pattern is rejected.
    pub fn decode(fid: Fid, code: i32) -> KernelResult<Self> {
        let non_blocking = code & LOCK_NB != 0;
        let action = match code & !LOCK_NB {
            LOCK_SH => LockAction::Shared,
            LOCK_EX => LockAction::Exclusive,
            LOCK_UN => LockAction::Unlock,
            _ => {
                return Err(KernelError::invalid_argument(format!(
                    "invalid lock operation {}",
                    code
                )))
            }
        };
        Ok(Self {
            fid,
            action,
            non_blocking,
        })
    }
}

impl SyscallExecutor {
    /// Apply lock action `code` to descriptor `fid`. Invalid codes and
    /// descriptors fail before anything waits; blocking requests yield until
    /// the lock is free or the configured lock timeout passes.
    pub async fn flock(&self, fid: Fid, code: i32) -> KernelResult<()> {
        let span = span_syscall("flock", self.pid());
        async move {
            let request = LockRequest::decode(fid, code)?;
            self.files()
                .flock(request.fid, request.action, request.non_blocking)
                .await?;
            debug!(
                fid,
                action = ?request.action,
                non_blocking = request.non_blocking,
                "lock applied"
            );
            Ok(())
        }
        .instrument(span)
        .await
    }
}
