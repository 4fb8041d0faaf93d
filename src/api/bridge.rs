/*!
 * Host Bridge
 *
 * Entry points an embedding host calls with loosely typed argument lists:
 * `spawn(command, [args], options)`, `exec(command, [args])` and
 * `flock(fid, code)`.
 */

use super::conversions::{argv_from_values, command_arg, error_to_value, int_arg, outcome_to_value};
use crate::core::errors::KernelError;
use crate::core::types::{Fid, KernelResult};
use crate::process::{ProcAttr, Process};
use crate::syscalls::{resolve_stdio_and_attrs, ExecHandle, SyscallExecutor};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct HostBridge {
    syscalls: SyscallExecutor,
}

impl HostBridge {
    pub fn new(syscalls: SyscallExecutor) -> Self {
        Self { syscalls }
    }

    pub fn syscalls(&self) -> &SyscallExecutor {
        &self.syscalls
    }

    /// Create and start a process.
    ///
    /// argv is the command followed by the elements of `args[1]`. When
    /// `args[2]` is given it is parsed as spawn options and a truthy
    /// `argv0` replaces argv[0].
    #[instrument(skip(self, args), fields(argc = args.len()))]
    pub fn spawn(&self, args: &[Value]) -> KernelResult<Arc<Process>> {
        let command = command_arg(args)?;
        let mut argv = match args.get(1) {
            Some(list) => argv_from_values(&command, Some(list))?,
            None => vec![command.clone()],
        };

        let attr = match args.get(2) {
            Some(options) => {
                let (argv0, attr) = resolve_stdio_and_attrs(&command, options)?;
                argv[0] = argv0;
                attr
            }
            None => ProcAttr::default(),
        };

        debug!(command = %command, ?argv, "host spawn");
        self.syscalls.spawn(&command, argv, &attr)
    }

    /// Run a command with captured output; exactly two arguments.
    ///
    /// Argument errors are returned directly; everything after that is
    /// delivered through the handle.
    #[instrument(skip(self, args), fields(argc = args.len()))]
    pub fn exec(&self, args: &[Value]) -> KernelResult<ExecHandle> {
        if args.len() != 2 {
            return Err(KernelError::invalid_argument(format!(
                "expected 2 arguments (command, args), got {}",
                args.len()
            )));
        }
        let command = command_arg(args)?;
        let argv = argv_from_values(&command, args.get(1))?;
        Ok(self.syscalls.exec(&command, argv))
    }

    /// Run `exec` and convert the result into a host value: the outcome
    /// object on success, a serialized error otherwise.
    pub async fn exec_value(&self, args: &[Value]) -> Result<Value, Value> {
        let handle = self.exec(args).map_err(|e| error_to_value(&e))?;
        match handle.await {
            Ok(outcome) => Ok(outcome_to_value(&outcome)),
            Err(e) => Err(error_to_value(&e)),
        }
    }

    /// Apply a lock action code to a descriptor; exactly two arguments
    #[instrument(skip(self, args), fields(argc = args.len()))]
    pub async fn flock(&self, args: &[Value]) -> KernelResult<()> {
        if args.len() != 2 {
            return Err(KernelError::invalid_argument(format!(
                "expected 2 arguments (fid, operation), got {}",
                args.len()
            )));
        }
        let fid = int_arg(&args[0], "fid")?;
        let fid = Fid::try_from(fid)
            .map_err(|_| KernelError::invalid_argument(format!("invalid descriptor {}", fid)))?;
        let code = int_arg(&args[1], "operation")?;
        let code = i32::try_from(code)
            .map_err(|_| KernelError::invalid_argument(format!("invalid lock operation {}", code)))?;
        self.syscalls.flock(fid, code).await
    }
}
