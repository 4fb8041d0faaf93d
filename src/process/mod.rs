/*!
 * Process Module
 * Process creation, program registry and lifecycle
 */

mod builtins;
pub mod handle;
pub mod manager;
pub mod registry;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use handle::Process;
pub use manager::{ProcessManager, ProcessManagerBuilder};
pub use registry::ProgramRegistry;
pub use traits::{Program, ProgramFuture};
pub use types::{Environment, ProcAttr, ProcessContext, ProcessInfo, ProcessState};
