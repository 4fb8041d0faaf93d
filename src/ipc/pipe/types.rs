/*!
 * Pipe Types
 * Identifiers, occupancy snapshots and errors for in-memory pipes
 */

use crate::core::limits;
use crate::core::serde::is_zero_usize;
use crate::core::types::Size;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use limits::{DEFAULT_PIPE_CAPACITY, MAX_PIPE_CAPACITY};

/// Pipe identifier
pub type PipeId = u32;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PipeError {
    /// Every read end is gone; nothing can consume further writes
    #[error("Broken pipe {0}")]
    Broken(PipeId),

    /// Nothing buffered while a writer is still open
    #[error("Pipe {0} is empty")]
    Empty(PipeId),

    #[error("Pipe {0} is full")]
    Full(PipeId),
}

impl PipeError {
    /// The operation would have to wait
    pub fn would_block(&self) -> bool {
        matches!(self, Self::Empty(_) | Self::Full(_))
    }
}

/// Point-in-time occupancy of a pipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipeStats {
    pub id: PipeId,
    pub capacity: Size,
    #[serde(skip_serializing_if = "is_zero_usize")]
    pub buffered: Size,
    pub readers: usize,
    pub writers: usize,
}
