/*!
 * Process Management
 * Process creation, descriptor wiring and the live process table
 */

use super::handle::{LiveTable, Process, ProcessSpec};
use super::registry::ProgramRegistry;
use super::types::{resolve_dir, validate_command, Environment, ProcAttr, ProcessContext, ProcessInfo};
use crate::core::config::KernelConfig;
use crate::core::errors::KernelError;
use crate::core::types::{Fid, KernelResult, Pid, INIT_PID, STDERR_FID, STDIN_FID, STDOUT_FID};
use crate::fs::{FileAttr, FileDescriptors, NodeTable, OpenFile};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug)]
struct Inner {
    config: KernelConfig,
    programs: ProgramRegistry,
    nodes: NodeTable,
    live: Arc<LiveTable>,
    next_pid: AtomicU32,
}

/// Creates processes and tracks the running ones; clones share state
#[derive(Debug, Clone)]
pub struct ProcessManager {
    inner: Arc<Inner>,
}

/// Builder for ProcessManager
#[derive(Debug, Default)]
pub struct ProcessManagerBuilder {
    config: Option<KernelConfig>,
    programs: Option<ProgramRegistry>,
    nodes: Option<NodeTable>,
}

impl ProcessManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: KernelConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use `programs` instead of the builtin registry
    pub fn with_programs(mut self, programs: ProgramRegistry) -> Self {
        self.programs = Some(programs);
        self
    }

    pub fn with_nodes(mut self, nodes: NodeTable) -> Self {
        self.nodes = Some(nodes);
        self
    }

    pub fn build(self) -> ProcessManager {
        let config = self.config.unwrap_or_default();
        let programs = self.programs.unwrap_or_else(ProgramRegistry::with_builtins);
        info!(
            programs = programs.len(),
            max_processes = config.max_processes,
            "Process manager initialized"
        );

        ProcessManager {
            inner: Arc::new(Inner {
                live: LiveTable::new(config.max_processes),
                next_pid: AtomicU32::new(INIT_PID + 1),
                nodes: self.nodes.unwrap_or_default(),
                programs,
                config,
            }),
        }
    }
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ProcessManager {
    pub fn new(config: KernelConfig) -> Self {
        Self::builder().with_config(config).build()
    }

    pub fn builder() -> ProcessManagerBuilder {
        ProcessManagerBuilder::new()
    }

    pub fn config(&self) -> &KernelConfig {
        &self.inner.config
    }

    pub fn programs(&self) -> &ProgramRegistry {
        &self.inner.programs
    }

    pub fn nodes(&self) -> &NodeTable {
        &self.inner.nodes
    }

    /// Context of the root process that host calls act on behalf of.
    ///
    /// Its descriptors 0, 1 and 2 are null streams.
    pub fn init_context(&self) -> KernelResult<ProcessContext> {
        let files = FileDescriptors::new(&self.inner.config, self.inner.nodes.clone());
        for fid in [STDIN_FID, STDOUT_FID, STDERR_FID] {
            files.install(fid, OpenFile::null())?;
        }
        Ok(ProcessContext {
            pid: INIT_PID,
            argv: Vec::new(),
            dir: self.inner.config.init_dir.clone(),
            env: Environment::new(),
            files,
        })
    }

    /// Create a process on behalf of `parent`.
    ///
    /// The child's descriptor table is built from `attr.files`; `Pipe`
    /// directives allocate a pipe in the parent's table, attach one end to
    /// the child and leave the other open in the parent, reported by
    /// [`Process::stdio_pipe`].
    pub fn create(
        &self,
        parent: &ProcessContext,
        command: &str,
        argv: Vec<String>,
        attr: &ProcAttr,
    ) -> KernelResult<Arc<Process>> {
        validate_command(command)?;
        let program = self
            .inner
            .programs
            .get(command)
            .ok_or_else(|| KernelError::CommandNotFound(command.into()))?;

        let argv = if argv.is_empty() {
            vec![command.to_string()]
        } else {
            argv
        };
        let dir = match attr.dir.as_deref() {
            Some(dir) => resolve_dir(&parent.dir, dir),
            None => parent.dir.clone(),
        };
        let env = attr.env.clone().unwrap_or_else(|| parent.env.clone());

        let files = parent.files.empty_like();
        let stdio_pipes = match wire_descriptors(&parent.files, &files, &attr.files) {
            Ok(pipes) => pipes,
            Err(e) => {
                files.close_all();
                return Err(e);
            }
        };

        let pid = self.inner.next_pid.fetch_add(1, Ordering::SeqCst);
        info!(
            pid,
            parent_pid = parent.pid,
            command,
            dir = %dir,
            descriptors = files.len(),
            "Created process"
        );

        Ok(Process::new(ProcessSpec {
            pid,
            parent_pid: parent.pid,
            command: command.to_string(),
            argv,
            dir,
            env,
            program,
            files,
            stdio_pipes,
            live: Arc::clone(&self.inner.live),
        }))
    }

    pub fn get(&self, pid: Pid) -> Option<Arc<Process>> {
        self.inner.live.get(pid)
    }

    /// Number of processes whose programs are running
    pub fn count(&self) -> usize {
        self.inner.live.len()
    }

    pub fn list(&self) -> Vec<ProcessInfo> {
        let mut infos = self.inner.live.infos();
        infos.sort_by_key(|info| info.pid);
        infos
    }
}

/// Populate `child` from `directives`, returning the parent-side pipe ends.
///
/// On error every parent-side end allocated so far is closed again.
fn wire_descriptors(
    parent: &FileDescriptors,
    child: &FileDescriptors,
    directives: &[FileAttr],
) -> KernelResult<Vec<(usize, Fid)>> {
    if directives.is_empty() {
        for fid in [STDIN_FID, STDOUT_FID, STDERR_FID] {
            if let Ok(file) = parent.get(fid) {
                child.install(fid, file)?;
            }
        }
        return Ok(Vec::new());
    }

    let mut retained: Vec<(usize, Fid)> = Vec::new();
    let result = directives.iter().enumerate().try_for_each(|(slot, directive)| {
        let fid = slot as Fid;
        match *directive {
            FileAttr::Inherit(source) | FileAttr::Numeric(source) => {
                child.install(fid, parent.get(source)?)
            }
            FileAttr::Ignore => child.install(fid, OpenFile::null()),
            FileAttr::Pipe => {
                let (read_fid, write_fid) = parent.pipe()?;
                let (child_end, parent_end) = if fid == STDIN_FID {
                    (read_fid, write_fid)
                } else {
                    (write_fid, read_fid)
                };
                retained.push((slot, parent_end));
                child.install(fid, parent.get(child_end)?)?;
                parent.close(child_end)?;
                debug!(slot, parent_end, "stdio pipe attached");
                Ok(())
            }
        }
    });

    match result {
        Ok(()) => Ok(retained),
        Err(e) => {
            for (_, fid) in retained {
                let _ = parent.close(fid);
            }
            Err(e)
        }
    }
}
