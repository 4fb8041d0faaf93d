/*!
 * Syscall Executor
 * Process and descriptor calls made on behalf of one calling process
 */

use crate::core::config::KernelConfig;
use crate::core::errors::KernelError;
use crate::core::types::{KernelResult, Pid};
use crate::fs::FileDescriptors;
use crate::monitoring::span_syscall;
use crate::process::{ProcAttr, Process, ProcessContext, ProcessManager};
use std::sync::Arc;
use tracing::{info, warn};

/// System call executor bound to a calling process.
///
/// Clones share the process manager and the caller's descriptor table.
#[derive(Debug, Clone)]
pub struct SyscallExecutor {
    pub(super) manager: ProcessManager,
    pub(super) context: ProcessContext,
}

impl SyscallExecutor {
    /// Executor acting as the root process of `manager`
    pub fn new(manager: ProcessManager) -> KernelResult<Self> {
        let context = manager.init_context()?;
        info!(pid = context.pid, "Syscall executor initialized");
        Ok(Self { manager, context })
    }

    /// Executor acting as the process described by `context`
    pub fn for_context(manager: ProcessManager, context: ProcessContext) -> Self {
        Self { manager, context }
    }

    pub fn pid(&self) -> Pid {
        self.context.pid
    }

    pub fn context(&self) -> &ProcessContext {
        &self.context
    }

    /// The caller's descriptor table
    pub fn files(&self) -> &FileDescriptors {
        &self.context.files
    }

    pub fn manager(&self) -> &ProcessManager {
        &self.manager
    }

    pub(super) fn config(&self) -> &KernelConfig {
        self.manager.config()
    }

    /// Create and start a process. The caller owns the returned handle and
    /// any `Pipe` ends left in its descriptor table.
    pub fn spawn(
        &self,
        command: &str,
        argv: Vec<String>,
        attr: &ProcAttr,
    ) -> KernelResult<Arc<Process>> {
        let span = span_syscall("spawn", self.pid());
        let _enter = span.enter();

        let process = self
            .manager
            .create(&self.context, command, argv, attr)
            .map_err(|e| KernelError::spawn_failure("Failed to create process", e))?;

        if let Err(e) = process.start() {
            warn!(pid = process.pid(), error = %e, "process failed to start");
            // Release the caller-side ends of any pipes wired for the child
            for slot in 0..attr.files.len() {
                if let Some(fid) = process.stdio_pipe(slot) {
                    let _ = self.context.files.close(fid);
                }
            }
            return Err(KernelError::spawn_failure("Failed to start process", e));
        }
        Ok(process)
    }
}
