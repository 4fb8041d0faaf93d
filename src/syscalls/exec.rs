/*!
 * Exec Orchestration
 *
 * Runs a command with stdin, stdout and stderr redirected through fresh
 * pipes and captures both output streams. The result is delivered exactly
 * once through an [`ExecHandle`]: either a complete [`ExecOutcome`] or a
 * single failure, never both.
 *
 * Sequence: create the one-shot result, provision three pipes, create and
 * start the process, launch one drain per output stream, then an exit-wait
 * task that collects output while waiting for the process, then waits for
 * both drains (bounded by the drain grace period) before fulfilling the
 * result.
 */

use super::executor::SyscallExecutor;
use super::output::{self, Aggregator, StreamKind};
use super::pipe::{provision_pipe, DescriptorGuard};
use crate::core::errors::KernelError;
use crate::core::types::{ExitCode, KernelResult, Pid};
use crate::fs::{FileAttr, RawReader};
use crate::monitoring::ExecSpan;
use crate::process::{ProcAttr, Process};
use bytes::Bytes;
use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

/// Result of a completed exec. A non-zero exit code is still a success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutcome {
    pub exit_code: ExitCode,
    pub pid: Pid,
    pub stdout: Bytes,
    pub stderr: Bytes,
    /// Set when the stream did not reach end-of-stream before delivery
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
}

impl ExecOutcome {
    pub fn stdout_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    pub fn stderr_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

type ExecResult = KernelResult<ExecOutcome>;

/// Deferred exec result; await it to get the outcome
#[derive(Debug)]
pub struct ExecHandle {
    id: Uuid,
    pid: Option<Pid>,
    result: oneshot::Receiver<ExecResult>,
    cancel: Option<oneshot::Sender<()>>,
}

impl ExecHandle {
    /// Invocation id, also recorded as `trace_id` on the exec span
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Pid of the started process; `None` when spawning failed
    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    /// Kill the process. The result then rejects with `Cancelled` unless it
    /// had already been produced. Returns false if cancel was already sent
    /// or nothing is left to cancel.
    pub fn cancel(&mut self) -> bool {
        match self.cancel.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

impl Future for ExecHandle {
    type Output = ExecResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.result).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(KernelError::Internal("exec result was dropped".into()))
            })
        })
    }
}

/// Process started with captured output
struct Started {
    process: Arc<Process>,
    stdout: RawReader,
    stderr: RawReader,
}

impl SyscallExecutor {
    /// Run `command` with captured output.
    ///
    /// Never fails synchronously: spawn failures are delivered through the
    /// returned handle, wrapped as `SpawnFailure`.
    pub fn exec(&self, command: &str, argv: Vec<String>) -> ExecHandle {
        let (result_tx, result_rx) = oneshot::channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let exec_span = ExecSpan::new(command);
        let id = exec_span.trace_id();

        let started = exec_span
            .span()
            .in_scope(|| self.start_captured(command, argv));

        let started = match started {
            Ok(started) => started,
            Err(e) => {
                let err = KernelError::spawn_failure("Failed to spawn process", e);
                exec_span.record_error(&err);
                let _ = result_tx.send(Err(err));
                return ExecHandle {
                    id,
                    pid: None,
                    result: result_rx,
                    cancel: None,
                };
            }
        };

        let pid = started.process.pid();
        exec_span.record_pid(pid);

        let config = self.config();
        let (events, aggregator) = output::channel();
        let span = exec_span.span().clone();
        let _enter = span.enter();
        output::spawn_drain(
            StreamKind::Stdout,
            started.stdout,
            events.clone(),
            config.drain_chunk_size,
        );
        output::spawn_drain(
            StreamKind::Stderr,
            started.stderr,
            events,
            config.drain_chunk_size,
        );

        let grace = config.drain_grace;
        tokio::spawn(
            wait_and_deliver(
                started.process,
                aggregator,
                cancel_rx,
                result_tx,
                grace,
                exec_span,
            )
            .in_current_span(),
        );

        ExecHandle {
            id,
            pid: Some(pid),
            result: result_rx,
            cancel: Some(cancel_tx),
        }
    }

    /// Provision the three stdio pipes, create the process with them
    /// attached to slots 0/1/2 and start it. Every caller-side descriptor is
    /// closed before returning, on success or failure.
    fn start_captured(&self, command: &str, argv: Vec<String>) -> KernelResult<Started> {
        let files = self.files();
        let mut guard = DescriptorGuard::new(files);

        let stdin = guard.track(provision_pipe(files)?);
        let stdout = guard.track(provision_pipe(files)?);
        let stderr = guard.track(provision_pipe(files)?);

        let attr = ProcAttr::new().with_files(vec![
            FileAttr::Numeric(stdin.read),
            FileAttr::Numeric(stdout.write),
            FileAttr::Numeric(stderr.write),
        ]);
        let process = self.manager.create(self.context(), command, argv, &attr)?;

        let stdout = files.raw_reader(stdout.read)?;
        let stderr = files.raw_reader(stderr.read)?;
        // The child holds its own references; closing here leaves the child
        // as the only writer and sends EOF to its stdin.
        guard.close_all();

        process.start()?;
        debug!(pid = process.pid(), "captured process started");
        Ok(Started {
            process,
            stdout,
            stderr,
        })
    }
}

async fn wait_and_deliver(
    process: Arc<Process>,
    mut aggregator: Aggregator,
    mut cancel: oneshot::Receiver<()>,
    result: oneshot::Sender<ExecResult>,
    grace: Duration,
    span: ExecSpan,
) {
    // Output is applied while the child runs
    let exited = process.wait();
    tokio::pin!(exited);
    let mut cancel_open = true;
    let (exit, cancelled) = loop {
        tokio::select! {
            exit = &mut exited => break (exit, false),
            received = &mut cancel, if cancel_open => match received {
                Ok(()) => {
                    info!(pid = process.pid(), "exec cancelled");
                    let _ = process.kill();
                    break (exited.as_mut().await, true);
                }
                // Handle dropped without cancelling
                Err(_) => cancel_open = false,
            },
            () = aggregator.run(), if !aggregator.is_complete() => {}
        }
    };

    let exit_code = match exit {
        Ok(code) => code,
        Err(e) => {
            span.record_error(&e);
            let _ = result.send(Err(e));
            return;
        }
    };

    if tokio::time::timeout(grace, aggregator.run()).await.is_err() {
        warn!(
            pid = process.pid(),
            grace_ms = grace.as_millis() as u64,
            "output streams still open after exit, delivering partial output"
        );
    }
    let captured = aggregator.finish();

    let delivered = if cancelled {
        let err = KernelError::Cancelled(format!("process {} was cancelled", process.pid()).into());
        span.record_error(&err);
        Err(err)
    } else {
        span.record_outcome(exit_code, captured.stdout.len(), captured.stderr.len());
        Ok(ExecOutcome {
            exit_code,
            pid: process.pid(),
            stdout: captured.stdout,
            stderr: captured.stderr,
            stdout_truncated: captured.stdout_truncated,
            stderr_truncated: captured.stderr_truncated,
        })
    };

    if result.send(delivered).is_err() {
        debug!(pid = process.pid(), "exec result dropped by caller");
    }
}
