/*!
 * Process Traits
 * In-process program abstraction
 */

use super::types::ProcessContext;
use crate::core::types::ExitCode;
use futures::future::BoxFuture;
use std::future::Future;

/// Future a program runs as; resolves to its exit code
pub type ProgramFuture = BoxFuture<'static, ExitCode>;

/// A runnable program.
///
/// The context owns the process's descriptor table; dropping it when the
/// future completes is what closes the process's ends of its pipes.
pub trait Program: Send + Sync + 'static {
    fn run(&self, ctx: ProcessContext) -> ProgramFuture;
}

impl<F, Fut> Program for F
where
    F: Fn(ProcessContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ExitCode> + Send + 'static,
{
    fn run(&self, ctx: ProcessContext) -> ProgramFuture {
        Box::pin(self(ctx))
    }
}
