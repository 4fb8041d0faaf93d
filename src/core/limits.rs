/*!
 * System Limits and Constants
 *
 * Centralized location for system-wide limits and defaults.
 * Every value here can be overridden through `KernelConfig`.
 */

use std::time::Duration;

// =============================================================================
// PIPE LIMITS
// =============================================================================

/// Default pipe buffer capacity (64KB)
/// [LINUX-COMPAT] Matches Linux default pipe buffer
pub const DEFAULT_PIPE_CAPACITY: usize = 65536;

/// Maximum pipe capacity (1MB)
pub const MAX_PIPE_CAPACITY: usize = 1024 * 1024;

// =============================================================================
// DESCRIPTOR AND PROCESS LIMITS
// =============================================================================

/// Standard file descriptor limit per descriptor table
pub const STANDARD_MAX_FILE_DESCRIPTORS: usize = 1024;

/// Maximum concurrently live virtual processes
pub const MAX_LIVE_PROCESSES: usize = 512;

// =============================================================================
// OUTPUT CAPTURE
// =============================================================================

/// Bytes requested per drain read
/// Small reads keep interleaving fair between concurrent drains
pub const DEFAULT_DRAIN_CHUNK_SIZE: usize = 1024;

/// How long exec waits for captured streams to reach EOF after the child exits.
/// Descendants holding a write end past this point get their output truncated.
pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(2);

// =============================================================================
// LOCKING
// =============================================================================

/// Upper bound for a blocking flock request before it fails
pub const DEFAULT_LOCK_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// EXIT CODES
// =============================================================================

/// Exit code reported for a killed process (128 + SIGKILL)
pub const KILLED_EXIT_CODE: i32 = 137;

/// Exit code reported for a program that panicked
pub const CRASHED_EXIT_CODE: i32 = 134;

/// Exit code reported when a builtin is misused
pub const USAGE_EXIT_CODE: i32 = 2;
