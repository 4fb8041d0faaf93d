/*!
 * Request Conversion Utilities
 * Extracts typed call arguments from host values
 */

use crate::core::errors::KernelError;
use crate::core::json::to_text;
use crate::core::types::KernelResult;
use serde_json::Value;

/// Command name from the first argument, coerced to text
pub fn command_arg(args: &[Value]) -> KernelResult<String> {
    args.first()
        .map(to_text)
        .ok_or_else(|| KernelError::invalid_argument("expected a command name"))
}

/// `[command, ...list]`, each element coerced to text.
///
/// `list` must be an array; anything else (including a missing value) is
/// rejected.
pub fn argv_from_values(command: &str, list: Option<&Value>) -> KernelResult<Vec<String>> {
    match list {
        Some(Value::Array(items)) => Ok(std::iter::once(command.to_string())
            .chain(items.iter().map(to_text))
            .collect()),
        _ => Err(KernelError::invalid_argument(
            "second argument must be an array of arguments",
        )),
    }
}

/// Integer argument, truncated toward zero
pub fn int_arg(value: &Value, name: &str) -> KernelResult<i64> {
    value
        .as_f64()
        .filter(|f| f.is_finite())
        .map(|f| f.trunc() as i64)
        .ok_or_else(|| KernelError::invalid_argument(format!("{} must be a number", name)))
}
