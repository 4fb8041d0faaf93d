/*!
 * Kernel
 * Boots the process manager and the root process's syscall executor
 */

use crate::api::HostBridge;
use crate::core::config::KernelConfig;
use crate::core::types::KernelResult;
use crate::fs::NodeTable;
use crate::process::{ProcessManager, ProgramRegistry};
use crate::syscalls::SyscallExecutor;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Kernel {
    manager: ProcessManager,
    syscalls: SyscallExecutor,
}

impl Kernel {
    /// Kernel with the builtin programs
    pub fn new(config: KernelConfig) -> KernelResult<Self> {
        Self::with_programs(config, ProgramRegistry::with_builtins())
    }

    pub fn with_programs(config: KernelConfig, programs: ProgramRegistry) -> KernelResult<Self> {
        config.validate()?;
        let manager = ProcessManager::builder()
            .with_config(config)
            .with_programs(programs)
            .with_nodes(NodeTable::new())
            .build();
        let syscalls = SyscallExecutor::new(manager.clone())?;
        info!(
            programs = manager.programs().len(),
            "Kernel initialized"
        );
        Ok(Self { manager, syscalls })
    }

    /// Calls made as the root process
    pub fn syscalls(&self) -> &SyscallExecutor {
        &self.syscalls
    }

    pub fn bridge(&self) -> HostBridge {
        HostBridge::new(self.syscalls.clone())
    }

    pub fn processes(&self) -> &ProcessManager {
        &self.manager
    }

    pub fn programs(&self) -> &ProgramRegistry {
        self.manager.programs()
    }

    /// In-memory files visible to every process
    pub fn nodes(&self) -> &NodeTable {
        self.manager.nodes()
    }
}
