/*!
 * Pipe Module
 * Unix-style pipes for streaming data between processes
 */

pub mod pipe;
pub mod types;

// Re-export public API
pub use pipe::{channel, PipeReader, PipeWriter};
pub use types::{PipeError, PipeId, PipeStats};
