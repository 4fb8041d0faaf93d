/*!
 * Stdio Attribute Resolution
 *
 * Turns the free-form spawn options a host passes (`cwd`, `env`, `stdio`,
 * `argv0`) into process attributes and an ordered list of descriptor
 * attachment directives.
 */

use crate::core::errors::KernelError;
use crate::core::json::{is_truthy, to_text, truthy};
use crate::core::types::{Fid, KernelResult};
use crate::fs::FileAttr;
use crate::process::{Environment, ProcAttr};
use serde_json::Value;

/// Keyword forms a stdio entry may take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioKeyword {
    Ignore,
    Inherit,
    Pipe,
}

/// One element of the host's `stdio` array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioEntry {
    Numeric(Fid),
    Keyword(StdioKeyword),
    /// Any other value; dropped without error
    Unrecognized,
}

impl StdioEntry {
    pub fn from_value(value: &Value) -> KernelResult<Self> {
        Ok(match value {
            Value::Number(n) => StdioEntry::Numeric(numeric_fid(n)?),
            Value::String(s) => match s.as_str() {
                "ignore" => StdioEntry::Keyword(StdioKeyword::Ignore),
                "inherit" => StdioEntry::Keyword(StdioKeyword::Inherit),
                "pipe" => StdioEntry::Keyword(StdioKeyword::Pipe),
                _ => StdioEntry::Unrecognized,
            },
            _ => StdioEntry::Unrecognized,
        })
    }

    /// Directive for this entry at iteration index `index`
    pub fn directive(self, index: usize) -> KernelResult<Option<FileAttr>> {
        Ok(match self {
            StdioEntry::Numeric(fid) => Some(FileAttr::Numeric(fid)),
            StdioEntry::Keyword(StdioKeyword::Ignore) => Some(FileAttr::Ignore),
            StdioEntry::Keyword(StdioKeyword::Inherit) => {
                let fid = Fid::try_from(index).map_err(|_| {
                    KernelError::invalid_argument(format!("stdio slot {} out of range", index))
                })?;
                Some(FileAttr::Inherit(fid))
            }
            StdioEntry::Keyword(StdioKeyword::Pipe) => Some(FileAttr::Pipe),
            StdioEntry::Unrecognized => None,
        })
    }
}

/// Fractions truncate toward zero; negative or oversized numbers are rejected
fn numeric_fid(n: &serde_json::Number) -> KernelResult<Fid> {
    let value = n
        .as_f64()
        .ok_or_else(|| KernelError::invalid_argument(format!("invalid descriptor {}", n)))?;
    if !value.is_finite() || value < 0.0 || value.trunc() > Fid::MAX as f64 {
        return Err(KernelError::invalid_argument(format!(
            "invalid descriptor {}",
            n
        )));
    }
    Ok(value.trunc() as Fid)
}

/// Parsed spawn options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnOptions {
    pub cwd: Option<String>,
    pub env: Option<Environment>,
    pub stdio: Vec<StdioEntry>,
    pub argv0: Option<String>,
}

impl SpawnOptions {
    /// Parse host options. A falsy value means no options at all.
    pub fn from_value(options: &Value) -> KernelResult<Self> {
        let map = match options {
            Value::Object(map) => map,
            other if !is_truthy(other) => return Ok(Self::default()),
            _ => return Err(KernelError::invalid_argument("options must be an object")),
        };

        let cwd = truthy(map.get("cwd")).map(to_text);

        let env = match truthy(map.get("env")) {
            None => None,
            Some(Value::Object(vars)) => Some(
                vars.iter()
                    .map(|(key, value)| (key.clone(), to_text(value)))
                    .collect::<Environment>(),
            ),
            Some(_) => return Err(KernelError::invalid_argument("env must be an object")),
        };

        let stdio = match truthy(map.get("stdio")) {
            None => Vec::new(),
            Some(Value::Array(entries)) => entries
                .iter()
                .map(StdioEntry::from_value)
                .collect::<KernelResult<Vec<_>>>()?,
            Some(_) => return Err(KernelError::invalid_argument("stdio must be an array")),
        };

        let argv0 = truthy(map.get("argv0")).map(to_text);

        Ok(Self {
            cwd,
            env,
            stdio,
            argv0,
        })
    }

    /// Directives in iteration order. Unrecognized entries are dropped, so
    /// later entries shift down to fill their slot.
    pub fn directives(&self) -> KernelResult<Vec<FileAttr>> {
        self.stdio
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| entry.directive(index).transpose())
            .collect()
    }

    pub fn into_attrs(self, default_command: &str) -> KernelResult<(String, ProcAttr)> {
        let files = self.directives()?;
        let argv0 = self.argv0.unwrap_or_else(|| default_command.to_string());
        Ok((
            argv0,
            ProcAttr {
                dir: self.cwd,
                env: self.env,
                files,
            },
        ))
    }
}

/// Resolve host spawn options into `(argv0, attributes)`
pub fn resolve_stdio_and_attrs(
    default_command: &str,
    options: &Value,
) -> KernelResult<(String, ProcAttr)> {
    SpawnOptions::from_value(options)?.into_attrs(default_command)
}
