/*!
 * Response Conversion Utilities
 * Converts kernel results into host values
 */

use crate::core::errors::{KernelError, SerializableError};
use crate::process::Process;
use crate::syscalls::ExecOutcome;
use serde_json::{json, Value};

/// `{stdout, stderr, pid, exitCode}`; output bytes are decoded lossily
pub fn outcome_to_value(outcome: &ExecOutcome) -> Value {
    json!({
        "stdout": outcome.stdout_lossy(),
        "stderr": outcome.stderr_lossy(),
        "pid": outcome.pid,
        "exitCode": outcome.exit_code,
    })
}

pub fn error_to_value(err: &KernelError) -> Value {
    serde_json::to_value(SerializableError::from(err))
        .unwrap_or_else(|_| json!({ "error_type": err.kind(), "message": err.to_string() }))
}

/// `{pid, stdio}` where `stdio[i]` is the caller-side descriptor of a piped
/// child slot, or null
pub fn process_to_value(process: &Process, slots: usize) -> Value {
    let stdio: Vec<Value> = (0..slots)
        .map(|slot| process.stdio_pipe(slot).map_or(Value::Null, Value::from))
        .collect();
    json!({
        "pid": process.pid(),
        "stdio": stdio,
    })
}
