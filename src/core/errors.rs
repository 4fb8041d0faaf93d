/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use crate::core::data_structures::InlineString;
use crate::core::types::Fid;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::fs::lock::LockError;
pub use crate::ipc::pipe::PipeError;

/// Unified kernel error type with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum KernelError {
    #[error("Invalid argument: {0}")]
    #[diagnostic(
        code(kernel::invalid_argument),
        help("Check the arity and shape of the arguments passed to the call.")
    )]
    InvalidArgument(InlineString),

    #[error("Resource exhausted: {0}")]
    #[diagnostic(
        code(kernel::resource_exhausted),
        help("Close unused descriptors or wait for processes to exit.")
    )]
    ResourceExhausted(InlineString),

    #[error("Bad file descriptor: {0}")]
    #[diagnostic(
        code(fs::bad_descriptor),
        help("The descriptor is not open in this process's descriptor table.")
    )]
    BadDescriptor(Fid),

    #[error("Command not found: {0}")]
    #[diagnostic(
        code(process::command_not_found),
        help("Register the program with the kernel's program registry before spawning it.")
    )]
    CommandNotFound(InlineString),

    #[error("Invalid process state: {0}")]
    #[diagnostic(
        code(process::invalid_state),
        help("Operation cannot be performed in current process state.")
    )]
    InvalidState(InlineString),

    #[error("{context}: {source}")]
    #[diagnostic(code(process::spawn_failure))]
    SpawnFailure {
        context: InlineString,
        #[source]
        source: Box<KernelError>,
    },

    #[error("Lock failure: {0}")]
    #[diagnostic(
        code(fs::lock_failure),
        help("Another open file description holds a conflicting advisory lock.")
    )]
    LockFailure(#[from] LockError),

    #[error("Stream read error: {0}")]
    #[diagnostic(code(fs::stream_read))]
    StreamRead(InlineString),

    #[error("Pipe error: {0}")]
    #[diagnostic(code(ipc::pipe))]
    Pipe(#[from] PipeError),

    #[error("Operation cancelled: {0}")]
    #[diagnostic(code(kernel::cancelled))]
    Cancelled(InlineString),

    #[error("I/O error: {0}")]
    #[diagnostic(
        code(kernel::io_error),
        help("Filesystem or I/O operation failed.")
    )]
    Io(InlineString),

    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(kernel::configuration_error),
        help("Invalid configuration. Review configuration parameters.")
    )]
    Configuration(InlineString),

    #[error("Internal error: {0}")]
    #[diagnostic(
        code(kernel::internal_error),
        help("An unexpected internal error occurred. Please report this issue.")
    )]
    Internal(InlineString),
}

impl KernelError {
    #[inline]
    pub fn invalid_argument(msg: impl Into<InlineString>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    #[inline]
    pub fn resource_exhausted(msg: impl Into<InlineString>) -> Self {
        Self::ResourceExhausted(msg.into())
    }

    #[inline]
    pub fn invalid_state(msg: impl Into<InlineString>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Wrap an error with the name of the operation that failed
    pub fn spawn_failure(context: impl Into<InlineString>, source: KernelError) -> Self {
        Self::SpawnFailure {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Short machine-readable tag used by host conversions
    pub fn kind(&self) -> &'static str {
        match self {
            KernelError::InvalidArgument(_) => "invalid_argument",
            KernelError::ResourceExhausted(_) => "resource_exhausted",
            KernelError::BadDescriptor(_) => "bad_descriptor",
            KernelError::CommandNotFound(_) => "command_not_found",
            KernelError::InvalidState(_) => "invalid_state",
            KernelError::SpawnFailure { .. } => "spawn_failure",
            KernelError::LockFailure(_) => "lock_failure",
            KernelError::StreamRead(_) => "stream_read_error",
            KernelError::Pipe(_) => "pipe_error",
            KernelError::Cancelled(_) => "cancelled",
            KernelError::Io(_) => "io_error",
            KernelError::Configuration(_) => "configuration_error",
            KernelError::Internal(_) => "internal_error",
        }
    }
}

impl From<std::io::Error> for KernelError {
    fn from(err: std::io::Error) -> Self {
        KernelError::Io(err.to_string().into())
    }
}

impl From<String> for KernelError {
    fn from(msg: String) -> Self {
        KernelError::Internal(msg.into())
    }
}

impl From<&str> for KernelError {
    fn from(msg: &str) -> Self {
        KernelError::Internal(msg.into())
    }
}

/// Serializable error representation for host responses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SerializableError {
    pub error_type: InlineString,
    pub message: InlineString,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<InlineString>,
}

impl SerializableError {
    pub fn new(error_type: impl Into<InlineString>, message: impl Into<InlineString>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        error_type: impl Into<InlineString>,
        message: impl Into<InlineString>,
        details: impl Into<InlineString>,
    ) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            details: Some(details.into()),
        }
    }
}

impl From<&KernelError> for SerializableError {
    fn from(err: &KernelError) -> Self {
        match err {
            KernelError::SpawnFailure { source, .. } => {
                SerializableError::with_details(err.kind(), err.to_string(), source.kind())
            }
            _ => SerializableError::new(err.kind(), err.to_string()),
        }
    }
}

impl From<KernelError> for SerializableError {
    fn from(err: KernelError) -> Self {
        SerializableError::from(&err)
    }
}
