/*!
 * Builtin Programs
 * Small commands every kernel boots with
 */

use super::registry::ProgramRegistry;
use super::types::ProcessContext;
use crate::core::limits::USAGE_EXIT_CODE;
use crate::core::types::{ExitCode, KernelResult};
use std::time::Duration;
use tracing::debug;

const COPY_CHUNK: usize = 4096;

pub(super) fn install(registry: &ProgramRegistry) {
    registry.register("echo", echo);
    registry.register("cat", cat);
    registry.register("true", |_ctx: ProcessContext| async { 0 });
    registry.register("false", |_ctx: ProcessContext| async { 1 });
    registry.register("exit", exit);
    registry.register("pwd", pwd);
    registry.register("env", env);
    registry.register("sleep", sleep);
}

/// Report a write failure (usually a broken pipe) as exit status 1
fn status(pid: u32, result: KernelResult<()>) -> ExitCode {
    match result {
        Ok(()) => 0,
        Err(e) => {
            debug!(pid, error = %e, "builtin output failed");
            1
        }
    }
}

async fn echo(ctx: ProcessContext) -> ExitCode {
    let mut args = ctx.args();
    let newline = match args.first() {
        Some(flag) if flag == "-n" => {
            args = &args[1..];
            false
        }
        _ => true,
    };

    let mut line = args.join(" ");
    if newline {
        line.push('\n');
    }
    status(ctx.pid, ctx.print(line).await)
}

async fn cat(ctx: ProcessContext) -> ExitCode {
    if ctx.args().is_empty() {
        return status(ctx.pid, copy_stdin(&ctx).await);
    }

    let mut code = 0;
    for arg in ctx.args() {
        let path = ctx.resolve_path(arg);
        if let Err(e) = cat_file(&ctx, &path).await {
            let _ = ctx.eprint(format!("cat: {}: {}\n", arg, e)).await;
            code = 1;
        }
    }
    code
}

async fn cat_file(ctx: &ProcessContext, path: &str) -> KernelResult<()> {
    let fid = ctx.files.open(path, false)?;
    let reader = ctx.files.raw_reader(fid);
    ctx.files.close(fid)?;
    let contents = reader?.read_to_end().await?;
    ctx.print(contents).await
}

async fn copy_stdin(ctx: &ProcessContext) -> KernelResult<()> {
    let mut stdin = ctx.stdin()?;
    let stdout = ctx.stdout()?;
    let mut buf = vec![0u8; COPY_CHUNK];
    loop {
        let n = stdin.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        stdout.write_all(&buf[..n]).await?;
    }
}

async fn exit(ctx: ProcessContext) -> ExitCode {
    match ctx.args().first() {
        None => 0,
        Some(code) => match code.parse::<ExitCode>() {
            Ok(code) => code,
            Err(_) => {
                let _ = ctx
                    .eprint(format!("exit: {}: numeric argument required\n", code))
                    .await;
                USAGE_EXIT_CODE
            }
        },
    }
}

async fn pwd(ctx: ProcessContext) -> ExitCode {
    let line = format!("{}\n", ctx.dir);
    status(ctx.pid, ctx.print(line).await)
}

async fn env(ctx: ProcessContext) -> ExitCode {
    let listing: String = ctx
        .env
        .iter()
        .map(|(key, value)| format!("{}={}\n", key, value))
        .collect();
    status(ctx.pid, ctx.print(listing).await)
}

async fn sleep(ctx: ProcessContext) -> ExitCode {
    let secs = match ctx.args().first().map(|s| s.parse::<f64>()) {
        Some(Ok(secs)) if secs.is_finite() && secs >= 0.0 => secs,
        _ => {
            let _ = ctx.eprint("sleep: invalid time interval\n").await;
            return USAGE_EXIT_CODE;
        }
    };
    tokio::time::sleep(Duration::from_secs_f64(secs)).await;
    0
}
