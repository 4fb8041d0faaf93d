/*!
 * Process Handle
 *
 * A created process owns its descriptor table and a registered program.
 * `start` runs the program on the current tokio runtime under a supervisor
 * task that records the exit code, closes every descriptor the process still
 * holds and removes it from the live table.
 */

use super::traits::Program;
use super::types::{Environment, ProcessContext, ProcessInfo, ProcessState};
use crate::core::errors::KernelError;
use crate::core::limits::{CRASHED_EXIT_CODE, KILLED_EXIT_CODE};
use crate::core::types::{ExitCode, Fid, KernelResult, Pid};
use crate::fs::FileDescriptors;
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{error, info};

/// Processes whose programs are running, keyed by pid.
///
/// Slots are claimed before a program starts and given back when it exits,
/// so concurrent starts never exceed `max`.
#[derive(Debug)]
pub(crate) struct LiveTable {
    processes: DashMap<Pid, Arc<Process>, RandomState>,
    slots: AtomicUsize,
    max: usize,
}

impl LiveTable {
    pub(crate) fn new(max: usize) -> Arc<Self> {
        Arc::new(Self {
            processes: DashMap::with_capacity_and_hasher(0, RandomState::new()),
            slots: AtomicUsize::new(0),
            max,
        })
    }

    fn reserve(&self) -> bool {
        self.slots
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                (used < self.max).then_some(used + 1)
            })
            .is_ok()
    }

    fn insert(&self, process: Arc<Process>) {
        self.processes.insert(process.pid, process);
    }

    fn remove(&self, pid: Pid) {
        if self.processes.remove(&pid).is_some() {
            self.slots.fetch_sub(1, Ordering::AcqRel);
        }
    }

    pub(crate) fn get(&self, pid: Pid) -> Option<Arc<Process>> {
        self.processes.get(&pid).map(|p| Arc::clone(p.value()))
    }

    pub(crate) fn len(&self) -> usize {
        self.processes.len()
    }

    pub(crate) fn infos(&self) -> Vec<ProcessInfo> {
        self.processes.iter().map(|p| p.value().info()).collect()
    }
}

pub struct Process {
    pid: Pid,
    parent_pid: Pid,
    command: String,
    argv: Vec<String>,
    dir: String,
    env: Environment,
    program: Arc<dyn Program>,
    files: FileDescriptors,
    /// Caller-side ends of `Pipe` directives, by child slot
    stdio_pipes: Vec<(usize, Fid)>,
    state: RwLock<ProcessState>,
    exit: watch::Sender<Option<ExitCode>>,
    abort: Mutex<Option<AbortHandle>>,
    live: Arc<LiveTable>,
}

impl std::fmt::Debug for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("command", &self.command)
            .field("state", &*self.state.read())
            .field("exit_code", &self.exit_code())
            .finish()
    }
}

/// Construction parameters, filled in by the process manager
pub(crate) struct ProcessSpec {
    pub pid: Pid,
    pub parent_pid: Pid,
    pub command: String,
    pub argv: Vec<String>,
    pub dir: String,
    pub env: Environment,
    pub program: Arc<dyn Program>,
    pub files: FileDescriptors,
    pub stdio_pipes: Vec<(usize, Fid)>,
    pub live: Arc<LiveTable>,
}

impl Process {
    pub(crate) fn new(spec: ProcessSpec) -> Arc<Self> {
        let (exit, _) = watch::channel(None);
        Arc::new(Self {
            pid: spec.pid,
            parent_pid: spec.parent_pid,
            command: spec.command,
            argv: spec.argv,
            dir: spec.dir,
            env: spec.env,
            program: spec.program,
            files: spec.files,
            stdio_pipes: spec.stdio_pipes,
            state: RwLock::new(ProcessState::Created),
            exit,
            abort: Mutex::new(None),
            live: spec.live,
        })
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn parent_pid(&self) -> Pid {
        self.parent_pid
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn dir(&self) -> &str {
        &self.dir
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// The process's own descriptor table
    pub fn files(&self) -> &FileDescriptors {
        &self.files
    }

    pub fn state(&self) -> ProcessState {
        *self.state.read()
    }

    pub fn exit_code(&self) -> Option<ExitCode> {
        *self.exit.borrow()
    }

    /// Creator-side descriptor of the pipe attached to child `slot`, if that
    /// slot was given a `Pipe` directive
    pub fn stdio_pipe(&self, slot: usize) -> Option<Fid> {
        self.stdio_pipes
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, fid)| *fid)
    }

    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            pid: self.pid,
            parent_pid: self.parent_pid,
            command: self.command.clone(),
            argv: self.argv.clone(),
            dir: self.dir.clone(),
            state: self.state(),
            exit_code: self.exit_code(),
        }
    }

    /// Start the program on the current runtime
    pub fn start(self: &Arc<Self>) -> KernelResult<()> {
        let runtime = Handle::try_current()
            .map_err(|_| KernelError::invalid_state("no async runtime to run the process on"))?;

        let mut state = self.state.write();
        if *state != ProcessState::Created {
            return Err(KernelError::invalid_state(format!(
                "process {} already started",
                self.pid
            )));
        }
        if !self.live.reserve() {
            return Err(KernelError::resource_exhausted(format!(
                "live process limit reached ({})",
                self.live.max
            )));
        }

        let ctx = ProcessContext {
            pid: self.pid,
            argv: self.argv.clone(),
            dir: self.dir.clone(),
            env: self.env.clone(),
            files: self.files.clone(),
        };

        self.live.insert(Arc::clone(self));
        let program = runtime.spawn(self.program.run(ctx));
        *self.abort.lock() = Some(program.abort_handle());
        *state = ProcessState::Running;
        drop(state);

        info!(pid = self.pid, command = %self.command, "process started");

        let this = Arc::clone(self);
        runtime.spawn(async move {
            let code = match program.await {
                Ok(code) => code,
                Err(e) if e.is_cancelled() => KILLED_EXIT_CODE,
                Err(e) => {
                    error!(pid = this.pid, error = %e, "program panicked");
                    CRASHED_EXIT_CODE
                }
            };
            this.finish(code);
        });

        Ok(())
    }

    fn finish(&self, code: ExitCode) {
        // Descriptors close and the live slot frees before the exit is
        // published, so waiters observe both.
        self.files.close_all();
        self.live.remove(self.pid);
        self.abort.lock().take();
        *self.state.write() = ProcessState::Exited;
        self.exit.send_replace(Some(code));
        info!(pid = self.pid, exit_code = code, "process exited");
    }

    /// Wait for the program to finish and return its exit code
    pub async fn wait(&self) -> KernelResult<ExitCode> {
        if self.state() == ProcessState::Created {
            return Err(KernelError::invalid_state(format!(
                "process {} was never started",
                self.pid
            )));
        }

        let mut rx = self.exit.subscribe();
        let code = *rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| KernelError::Internal("exit channel closed".into()))?;
        code.ok_or_else(|| KernelError::Internal("exit code missing".into()))
    }

    /// Abort the running program; it exits with the killed status
    pub fn kill(&self) -> KernelResult<()> {
        match self.state() {
            ProcessState::Created => Err(KernelError::invalid_state(format!(
                "process {} was never started",
                self.pid
            ))),
            ProcessState::Exited => Ok(()),
            ProcessState::Running => {
                if let Some(abort) = self.abort.lock().as_ref() {
                    info!(pid = self.pid, "killing process");
                    abort.abort();
                }
                Ok(())
            }
        }
    }
}
