/*!
 * Syscalls Module
 * Spawn, exec and flock on behalf of a calling process
 */

mod exec;
mod executor;
mod flock;
pub mod output;
pub mod pipe;
pub mod stdio;

// Re-export public API
pub use exec::{ExecHandle, ExecOutcome};
pub use executor::SyscallExecutor;
pub use flock::{LockRequest, LOCK_EX, LOCK_NB, LOCK_SH, LOCK_UN};
pub use output::{Aggregator, Captured, DrainEvent, StreamKind};
pub use pipe::{provision_pipe, PipePair};
pub use stdio::{resolve_stdio_and_attrs, SpawnOptions, StdioEntry, StdioKeyword};
