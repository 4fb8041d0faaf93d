/*!
 * Monitoring
 * Structured tracing setup and per-call spans
 */

mod tracer;

pub use tracer::{generate_trace_id, init_tracing, span_syscall, ExecSpan};
