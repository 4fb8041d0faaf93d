/*!
 * Virtual Process Kernel Library
 *
 * A single-process kernel exposing POSIX-like process and descriptor
 * primitives to an embedding host: spawn and exec of registered programs
 * with redirected stdio, captured output, and flock-style advisory locks.
 */

pub mod api;
pub mod core;
pub mod fs;
pub mod ipc;
pub mod kernel;
pub mod monitoring;
pub mod process;
pub mod syscalls;

// Re-exports
pub use api::{error_to_value, outcome_to_value, HostBridge};
pub use crate::core::{
    ExitCode, Fid, InlineString, KernelConfig, KernelError, KernelResult, Pid, SerializableError,
};
pub use fs::{FileAttr, FileDescriptors, LockAction, NodeTable};
pub use kernel::Kernel;
pub use monitoring::init_tracing;
pub use process::{
    Process, ProcessContext, ProcessManager, Program, ProgramRegistry, ProcAttr,
};
pub use syscalls::{ExecHandle, ExecOutcome, SyscallExecutor, LOCK_EX, LOCK_NB, LOCK_SH, LOCK_UN};
