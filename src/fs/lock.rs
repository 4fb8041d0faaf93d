/*!
 * Advisory Locks
 *
 * flock(2)-style locks attached to a lockable object (an in-memory node or a
 * pipe). Ownership is per open file description: descriptors duplicated from
 * one another share a lock, independent opens of the same node contend.
 *
 * A blocking request waits asynchronously, so holders running on the same
 * runtime keep making progress and can release it.
 */

use crate::core::types::OpenFileId;
use ahash::AHashSet;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Requested lock operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockAction {
    Shared,
    Exclusive,
    Unlock,
}

/// Behaviour when the lock is contended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Fail immediately with `LockError::WouldBlock`
    NonBlocking,
    /// Wait for release, bounded by the timeout
    Blocking(Duration),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LockError {
    #[error("{action:?} lock would block")]
    WouldBlock { action: LockAction },

    #[error("{action:?} lock not acquired within {waited_ms}ms")]
    Timeout { action: LockAction, waited_ms: u64 },
}

#[derive(Debug, Default)]
struct LockState {
    exclusive: Option<OpenFileId>,
    shared: AHashSet<OpenFileId>,
}

impl LockState {
    fn try_acquire(&mut self, owner: OpenFileId, action: LockAction) -> bool {
        match action {
            LockAction::Unlock => {
                self.release(owner);
                true
            }
            LockAction::Shared => match self.exclusive {
                Some(holder) if holder == owner => {
                    // Downgrade
                    self.exclusive = None;
                    self.shared.insert(owner);
                    true
                }
                Some(_) => false,
                None => {
                    self.shared.insert(owner);
                    true
                }
            },
            LockAction::Exclusive => match self.exclusive {
                Some(holder) => holder == owner,
                None => {
                    // Upgrade only when no other description shares the lock
                    let others = self.shared.iter().any(|&holder| holder != owner);
                    if others {
                        return false;
                    }
                    self.shared.remove(&owner);
                    self.exclusive = Some(owner);
                    true
                }
            },
        }
    }

    fn release(&mut self, owner: OpenFileId) -> bool {
        let mut released = self.shared.remove(&owner);
        if self.exclusive == Some(owner) {
            self.exclusive = None;
            released = true;
        }
        released
    }
}

/// Lock state of one lockable object
#[derive(Debug, Default)]
pub struct AdvisoryLock {
    state: Mutex<LockState>,
    released: Notify,
}

impl AdvisoryLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `action` on behalf of the open file description `owner`.
    ///
    /// Holding the lock already in the requested mode is a no-op success.
    pub async fn apply(
        &self,
        owner: OpenFileId,
        action: LockAction,
        mode: LockMode,
    ) -> Result<(), LockError> {
        if self.try_apply(owner, action) {
            return Ok(());
        }

        let timeout = match mode {
            LockMode::NonBlocking => return Err(LockError::WouldBlock { action }),
            LockMode::Blocking(timeout) => timeout,
        };

        let started = Instant::now();
        let deadline = started + timeout;
        loop {
            let released = self.released.notified();
            tokio::pin!(released);
            // Registered before the retry so a release in between is not missed
            released.as_mut().enable();

            if self.try_apply(owner, action) {
                return Ok(());
            }
            if tokio::time::timeout_at(deadline, released).await.is_err() {
                // One last attempt; a release may have raced the deadline
                if self.try_apply(owner, action) {
                    return Ok(());
                }
                return Err(LockError::Timeout {
                    action,
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
        }
    }

    fn try_apply(&self, owner: OpenFileId, action: LockAction) -> bool {
        let acquired = self.state.lock().try_acquire(owner, action);
        // Unlock and downgrade can both admit waiters
        if acquired && action != LockAction::Exclusive {
            self.released.notify_waiters();
        }
        acquired
    }

    /// Drop whatever `owner` holds; called when its open file description closes
    pub fn release(&self, owner: OpenFileId) {
        let released = self.state.lock().release(owner);
        if released {
            self.released.notify_waiters();
        }
    }

    /// Current holders as (exclusive, shared count)
    pub fn holders(&self) -> (Option<OpenFileId>, usize) {
        let state = self.state.lock();
        (state.exclusive, state.shared.len())
    }
}
