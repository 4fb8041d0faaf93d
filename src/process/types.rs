/*!
 * Process Types
 * Attributes, state and the context handed to a running program
 */

use crate::core::errors::KernelError;
use crate::core::serde::{is_empty_vec, is_none};
use crate::core::types::{ExitCode, Fid, KernelResult, Pid, STDERR_FID, STDIN_FID, STDOUT_FID};
use crate::fs::{FileAttr, FileDescriptors, RawReader, RawWriter};
use path_clean::PathClean;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Environment mapping; keys are unique and iterate in sorted order
pub type Environment = BTreeMap<String, String>;

/// Attributes a new process is created with.
///
/// `files` is indexed by child slot. An empty list means the child inherits
/// the creator's descriptors 0, 1 and 2.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProcAttr {
    #[serde(default, skip_serializing_if = "is_none")]
    pub dir: Option<String>,
    #[serde(default, skip_serializing_if = "is_none")]
    pub env: Option<Environment>,
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub files: Vec<FileAttr>,
}

impl ProcAttr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dir(mut self, dir: impl Into<String>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, env: Environment) -> Self {
        self.env = Some(env);
        self
    }

    pub fn with_files(mut self, files: Vec<FileAttr>) -> Self {
        self.files = files;
        self
    }
}

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Created, descriptor table built, program not yet running
    Created,
    /// Program is running
    Running,
    /// Program finished; exit code is final
    Exited,
}

/// Process metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProcessInfo {
    pub pid: Pid,
    pub parent_pid: Pid,
    pub command: String,
    pub argv: Vec<String>,
    pub dir: String,
    pub state: ProcessState,
    #[serde(skip_serializing_if = "is_none")]
    pub exit_code: Option<ExitCode>,
}

/// Everything a program sees while it runs: its identity, arguments,
/// working directory, environment and descriptor table.
#[derive(Debug, Clone)]
pub struct ProcessContext {
    pub pid: Pid,
    pub argv: Vec<String>,
    pub dir: String,
    pub env: Environment,
    pub files: FileDescriptors,
}

impl ProcessContext {
    /// Arguments after argv[0]
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or(&[])
    }

    pub fn stdin(&self) -> KernelResult<RawReader> {
        self.files.raw_reader(STDIN_FID)
    }

    pub fn stdout(&self) -> KernelResult<RawWriter> {
        self.files.raw_writer(STDOUT_FID)
    }

    pub fn stderr(&self) -> KernelResult<RawWriter> {
        self.files.raw_writer(STDERR_FID)
    }

    pub fn writer(&self, fid: Fid) -> KernelResult<RawWriter> {
        self.files.raw_writer(fid)
    }

    /// Write all of `data` to stdout
    pub async fn print(&self, data: impl AsRef<[u8]>) -> KernelResult<()> {
        self.stdout()?.write_all(data.as_ref()).await
    }

    /// Write all of `data` to stderr
    pub async fn eprint(&self, data: impl AsRef<[u8]>) -> KernelResult<()> {
        self.stderr()?.write_all(data.as_ref()).await
    }

    /// Resolve `path` against the working directory
    pub fn resolve_path(&self, path: &str) -> String {
        resolve_dir(&self.dir, path)
    }
}

/// Join `path` onto `base` unless it is already absolute, then normalize
pub(crate) fn resolve_dir(base: &str, path: &str) -> String {
    let joined = Path::new(base).join(path).clean();
    joined.to_string_lossy().into_owned()
}

/// Validate a command name before lookup
pub(crate) fn validate_command(command: &str) -> KernelResult<()> {
    if command.is_empty() {
        return Err(KernelError::invalid_argument("command cannot be empty"));
    }
    if command.contains('\0') {
        return Err(KernelError::invalid_argument("command contains a NUL byte"));
    }
    Ok(())
}
