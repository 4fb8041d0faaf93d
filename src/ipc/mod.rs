/*!
 * IPC Module
 * Inter-process communication primitives
 */

pub mod pipe;

// Re-export for convenience
pub use pipe::{PipeError, PipeId, PipeReader, PipeStats, PipeWriter};
