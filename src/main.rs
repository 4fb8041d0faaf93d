/*!
 * Virtual Process Kernel - Main Entry Point
 *
 * Boots a kernel with the builtin programs, execs the command given on the
 * command line and prints the outcome as JSON:
 *
 *   kernel <command> [args...]
 *
 * Exits with the command's exit code, or 2 on usage and spawn errors.
 */

use miette::IntoDiagnostic;
use serde_json::Value;
use tracing::info;

use vproc_kernel::core::limits::USAGE_EXIT_CODE;
use vproc_kernel::{init_tracing, Kernel, KernelConfig};

#[tokio::main]
async fn main() -> miette::Result<()> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let Some(command) = args.next() else {
        eprintln!("usage: kernel <command> [args...]");
        std::process::exit(USAGE_EXIT_CODE);
    };
    let rest: Vec<Value> = args.map(Value::String).collect();

    let config = KernelConfig::from_env()?;
    let kernel = Kernel::new(config)?;
    info!(command = %command, "running command");

    let bridge = kernel.bridge();
    match bridge
        .exec_value(&[Value::String(command), Value::Array(rest)])
        .await
    {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome).into_diagnostic()?);
            let code = outcome["exitCode"].as_i64().unwrap_or(0) as i32;
            std::process::exit(code);
        }
        Err(error) => {
            println!("{}", serde_json::to_string_pretty(&error).into_diagnostic()?);
            std::process::exit(USAGE_EXIT_CODE);
        }
    }
}
