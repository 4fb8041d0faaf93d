/*!
 * Core Types
 * Common types used across the kernel
 */

/// Process ID type
pub type Pid = u32;

/// File descriptor identifier within a virtual descriptor table
pub type Fid = u32;

/// Process exit status
pub type ExitCode = i32;

/// Open file description identifier (shared by dup'd descriptors)
pub type OpenFileId = u64;

/// Size type for buffer operations
pub type Size = usize;

/// Common result type for kernel operations
pub type KernelResult<T> = Result<T, super::errors::KernelError>;

/// Standard stream slot numbers
pub const STDIN_FID: Fid = 0;
pub const STDOUT_FID: Fid = 1;
pub const STDERR_FID: Fid = 2;

/// PID of the bootstrap process every kernel owns
pub const INIT_PID: Pid = 1;
