/*!
 * Exec Tests
 * Captured-output execution through the syscall executor
 */

use futures::future::join_all;
use pretty_assertions::assert_eq;
use std::time::Duration;
use vproc_kernel::process::ProcessContext;
use vproc_kernel::{Kernel, KernelConfig, KernelError, ProgramRegistry};

fn kernel() -> Kernel {
    Kernel::new(KernelConfig::default()).unwrap()
}

fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_exec_echo_hi() {
    let kernel = kernel();
    let outcome = kernel
        .syscalls()
        .exec("echo", argv(&["echo", "hi"]))
        .await
        .unwrap();

    assert_eq!(outcome.exit_code, 0);
    assert_eq!(&outcome.stdout[..], b"hi\n");
    assert_eq!(&outcome.stderr[..], b"");
    assert!(outcome.pid > 0);
}

#[tokio::test]
async fn test_exec_nonexistent_command_rejects() {
    let kernel = kernel();
    let err = kernel
        .syscalls()
        .exec("definitely-not-a-command", argv(&["definitely-not-a-command"]))
        .await
        .unwrap_err();

    match err {
        KernelError::SpawnFailure { context, source } => {
            assert_eq!(context.as_str(), "Failed to spawn process");
            assert!(matches!(*source, KernelError::CommandNotFound(_)));
        }
        other => panic!("expected SpawnFailure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_nonzero_exit_is_an_outcome() {
    let kernel = kernel();
    let outcome = kernel
        .syscalls()
        .exec("exit", argv(&["exit", "42"]))
        .await
        .unwrap();
    assert_eq!(outcome.exit_code, 42);
    assert!(!outcome.success());
}

#[tokio::test]
async fn test_stderr_is_captured_separately() {
    let programs = ProgramRegistry::with_builtins();
    programs.register("noisy", |ctx: ProcessContext| async move {
        let _ = ctx.print("to stdout\n").await;
        let _ = ctx.eprint("to stderr\n").await;
        let _ = ctx.print("more stdout\n").await;
        3
    });
    let kernel = Kernel::with_programs(KernelConfig::default(), programs).unwrap();

    let outcome = kernel.syscalls().exec("noisy", argv(&["noisy"])).await.unwrap();
    assert_eq!(outcome.exit_code, 3);
    assert_eq!(outcome.stdout_lossy(), "to stdout\nmore stdout\n");
    assert_eq!(outcome.stderr_lossy(), "to stderr\n");
}

#[tokio::test]
async fn test_output_larger_than_pipe_capacity() {
    let programs = ProgramRegistry::with_builtins();
    programs.register("flood", |ctx: ProcessContext| async move {
        let line = vec![b'x'; 1000];
        for _ in 0..100 {
            if ctx.print(&line).await.is_err() {
                return 1;
            }
        }
        0
    });
    let config = KernelConfig::default().with_pipe_capacity(512);
    let kernel = Kernel::with_programs(config, programs).unwrap();

    let outcome = kernel.syscalls().exec("flood", argv(&["flood"])).await.unwrap();
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.stdout.len(), 100_000);
    assert!(outcome.stdout.iter().all(|b| *b == b'x'));
}

#[tokio::test]
async fn test_large_output_on_both_streams_default_config() {
    const TOTAL: usize = 300 * 1024;
    let programs = ProgramRegistry::with_builtins();
    programs.register("both", |ctx: ProcessContext| async move {
        let (out, err) = match (ctx.stdout(), ctx.stderr()) {
            (Ok(out), Ok(err)) => (out, err),
            _ => return 1,
        };
        let chunk_out = vec![b'o'; 4096];
        let chunk_err = vec![b'e'; 4096];
        let write_out = async {
            for _ in 0..TOTAL / 4096 {
                out.write_all(&chunk_out).await?;
            }
            Ok::<_, KernelError>(())
        };
        let write_err = async {
            for _ in 0..TOTAL / 4096 {
                err.write_all(&chunk_err).await?;
            }
            Ok::<_, KernelError>(())
        };
        match tokio::join!(write_out, write_err) {
            (Ok(()), Ok(())) => 0,
            _ => 1,
        }
    });
    let kernel = Kernel::with_programs(KernelConfig::default(), programs).unwrap();

    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        kernel.syscalls().exec("both", argv(&["both"])),
    )
    .await
    .expect("exec with large output did not complete")
    .unwrap();

    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.stdout.len(), TOTAL);
    assert_eq!(outcome.stderr.len(), TOTAL);
    assert!(outcome.stdout.iter().all(|b| *b == b'o'));
    assert!(outcome.stderr.iter().all(|b| *b == b'e'));
    assert!(!outcome.stdout_truncated);
    assert!(!outcome.stderr_truncated);
}

#[tokio::test]
async fn test_concurrent_execs_do_not_interleave() {
    let kernel = kernel();
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let word = format!("word-{i}");
            kernel.syscalls().exec("echo", argv(&["echo", &word, &word]))
        })
        .collect();

    let outcomes = join_all(handles).await;
    let mut pids = Vec::new();
    for (i, outcome) in outcomes.into_iter().enumerate() {
        let outcome = outcome.unwrap();
        assert_eq!(outcome.stdout_lossy(), format!("word-{i} word-{i}\n"));
        pids.push(outcome.pid);
    }
    pids.sort_unstable();
    pids.dedup();
    assert_eq!(pids.len(), 16);
}

#[tokio::test]
async fn test_cancel_rejects_with_cancelled() {
    let kernel = kernel();
    let mut handle = kernel.syscalls().exec("sleep", argv(&["sleep", "30"]));
    assert!(handle.pid().is_some());
    assert!(handle.cancel());
    assert!(!handle.cancel());

    let err = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, KernelError::Cancelled(_)));
}

#[tokio::test]
async fn test_result_is_pending_until_exit() {
    let kernel = kernel();
    let mut handle = kernel.syscalls().exec("sleep", argv(&["sleep", "0.2"]));
    tokio::time::sleep(Duration::from_millis(20)).await;
    {
        let mut task = tokio_test::task::spawn(&mut handle);
        tokio_test::assert_pending!(task.poll());
    }

    let outcome = handle.await.unwrap();
    assert_eq!(outcome.exit_code, 0);
}

#[tokio::test]
async fn test_exec_runs_in_callers_directory() {
    let kernel = kernel();
    let outcome = kernel.syscalls().exec("pwd", argv(&["pwd"])).await.unwrap();
    assert_eq!(outcome.stdout_lossy(), "/\n");
}

#[tokio::test]
async fn test_cat_reads_node_files() {
    let kernel = kernel();
    kernel.nodes().put("/etc/motd", "welcome\n").unwrap();
    let outcome = kernel
        .syscalls()
        .exec("cat", argv(&["cat", "/etc/motd", "/missing"]))
        .await
        .unwrap();
    assert_eq!(outcome.exit_code, 1);
    assert_eq!(outcome.stdout_lossy(), "welcome\n");
    assert!(outcome.stderr_lossy().starts_with("cat: /missing:"));
}

#[tokio::test]
async fn test_panicking_program_reports_crash() {
    let programs = ProgramRegistry::new();
    programs.register("crash", |_ctx: ProcessContext| async move {
        if true {
            panic!("program bug");
        }
        0
    });
    let kernel = Kernel::with_programs(KernelConfig::default(), programs).unwrap();

    let outcome = kernel.syscalls().exec("crash", argv(&["crash"])).await.unwrap();
    assert_eq!(outcome.exit_code, vproc_kernel::core::limits::CRASHED_EXIT_CODE);
    assert!(outcome.stdout.is_empty());
}
