/*!
 * Distributed Tracing
 * Structured tracing for spawn/exec/flock calls using the tracing crate
 *
 * Features:
 * - Invocation IDs for correlating an exec with its drains and exit-wait
 * - JSON-formatted logs for structured parsing
 * - Span fields filled in as the call progresses (pid, exit code, sizes)
 */

use std::time::Instant;
use tracing::{debug, field, info, span, warn, Level, Span};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use uuid::Uuid;

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - KERNEL_TRACE_JSON: Enable JSON output (default: false)
///
/// Returns false if a global subscriber was already installed.
pub fn init_tracing() -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("KERNEL_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "Structured tracing initialized");
    }
    installed
}

/// Generate a unique trace ID for request correlation
pub fn generate_trace_id() -> Uuid {
    Uuid::new_v4()
}

/// Span covering one exec from provisioning to result delivery.
///
/// Cloned into the drain and exit-wait tasks so everything they log carries
/// the same `trace_id`.
#[derive(Debug, Clone)]
pub struct ExecSpan {
    span: Span,
    start: Instant,
    trace_id: Uuid,
}

impl ExecSpan {
    pub fn new(command: &str) -> Self {
        let trace_id = generate_trace_id();
        let span = span!(
            Level::INFO,
            "exec",
            trace_id = %trace_id,
            command = command,
            pid = field::Empty,
            exit_code = field::Empty,
            stdout_bytes = field::Empty,
            stderr_bytes = field::Empty,
            duration_ms = field::Empty,
            error = field::Empty,
        );
        Self {
            span,
            start: Instant::now(),
            trace_id,
        }
    }

    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn record_pid(&self, pid: u32) {
        self.span.record("pid", pid);
    }

    pub fn record_error(&self, error: &dyn std::fmt::Display) {
        self.span.record("error", field::display(error));
        self.record_duration();
        self.span.in_scope(|| warn!(error = %error, "exec failed"));
    }

    pub fn record_outcome(&self, exit_code: i32, stdout_bytes: usize, stderr_bytes: usize) {
        self.span.record("exit_code", exit_code);
        self.span.record("stdout_bytes", stdout_bytes);
        self.span.record("stderr_bytes", stderr_bytes);
        self.record_duration();
        self.span.in_scope(|| {
            debug!(exit_code, stdout_bytes, stderr_bytes, "exec complete");
        });
    }

    fn record_duration(&self) {
        self.span
            .record("duration_ms", self.start.elapsed().as_millis() as u64);
    }
}

/// Span for a synchronous kernel call such as spawn or flock
pub fn span_syscall(name: &'static str, pid: u32) -> Span {
    span!(Level::DEBUG, "syscall", syscall = name, pid = pid)
}
