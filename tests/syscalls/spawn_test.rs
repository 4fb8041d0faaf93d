/*!
 * Spawn Tests
 * Synchronous process creation with caller-directed stdio
 */

use pretty_assertions::assert_eq;
use vproc_kernel::fs::FileAttr;
use vproc_kernel::process::{Environment, ProcessState};
use vproc_kernel::{Kernel, KernelConfig, KernelError, ProcAttr};

fn kernel() -> Kernel {
    Kernel::new(KernelConfig::default()).unwrap()
}

fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_spawn_with_piped_stdout() {
    let kernel = kernel();
    let syscalls = kernel.syscalls();
    let attr = ProcAttr::new().with_files(vec![FileAttr::Ignore, FileAttr::Pipe, FileAttr::Ignore]);

    let process = syscalls
        .spawn("echo", argv(&["echo", "piped"]), &attr)
        .unwrap();
    let stdout_fid = process.stdio_pipe(1).unwrap();
    assert!(process.stdio_pipe(0).is_none());

    let mut reader = syscalls.files().raw_reader(stdout_fid).unwrap();
    syscalls.files().close(stdout_fid).unwrap();
    let output = reader.read_to_end().await.unwrap();
    assert_eq!(output, b"piped\n");
    assert_eq!(process.wait().await.unwrap(), 0);
    assert_eq!(process.state(), ProcessState::Exited);
}

#[tokio::test]
async fn test_spawn_with_piped_stdin() {
    let kernel = kernel();
    let syscalls = kernel.syscalls();
    let attr = ProcAttr::new().with_files(vec![FileAttr::Pipe, FileAttr::Pipe]);

    let process = syscalls.spawn("cat", argv(&["cat"]), &attr).unwrap();
    let stdin_fid = process.stdio_pipe(0).unwrap();
    let stdout_fid = process.stdio_pipe(1).unwrap();

    let writer = syscalls.files().raw_writer(stdin_fid).unwrap();
    writer.write_all(b"round trip").await.unwrap();
    drop(writer);
    syscalls.files().close(stdin_fid).unwrap();

    let mut reader = syscalls.files().raw_reader(stdout_fid).unwrap();
    syscalls.files().close(stdout_fid).unwrap();
    assert_eq!(reader.read_to_end().await.unwrap(), b"round trip");
    assert_eq!(process.wait().await.unwrap(), 0);
}

#[tokio::test]
async fn test_inherit_shares_callers_descriptor() {
    let kernel = kernel();
    let syscalls = kernel.syscalls();

    // Point the caller's stdout at a pipe it can read
    let (read_fid, write_fid) = syscalls.files().pipe().unwrap();
    syscalls.files().dup2(write_fid, 1).unwrap();
    syscalls.files().close(write_fid).unwrap();

    let attr = ProcAttr::new().with_files(vec![
        FileAttr::Ignore,
        FileAttr::Inherit(1),
        FileAttr::Ignore,
    ]);
    let process = syscalls
        .spawn("echo", argv(&["echo", "inherited"]), &attr)
        .unwrap();
    assert_eq!(process.wait().await.unwrap(), 0);

    // Drop the caller's own reference so the reader sees EOF
    syscalls.files().install(1, vproc_kernel::fs::OpenFile::null()).unwrap();
    let mut reader = syscalls.files().raw_reader(read_fid).unwrap();
    assert_eq!(reader.read_to_end().await.unwrap(), b"inherited\n");
}

#[tokio::test]
async fn test_spawn_applies_dir_and_env() {
    let kernel = kernel();
    let syscalls = kernel.syscalls();
    let mut env = Environment::new();
    env.insert("HOME".into(), "/home/me".into());
    env.insert("LANG".into(), "C".into());
    let attr = ProcAttr::new()
        .with_dir("/home/me/src")
        .with_env(env)
        .with_files(vec![FileAttr::Ignore, FileAttr::Pipe]);

    let process = syscalls.spawn("env", argv(&["env"]), &attr).unwrap();
    assert_eq!(process.dir(), "/home/me/src");
    let fid = process.stdio_pipe(1).unwrap();
    let mut reader = syscalls.files().raw_reader(fid).unwrap();
    syscalls.files().close(fid).unwrap();
    assert_eq!(
        reader.read_to_end().await.unwrap(),
        b"HOME=/home/me\nLANG=C\n"
    );
}

#[tokio::test]
async fn test_spawn_unknown_command_is_sync_error() {
    let kernel = kernel();
    let err = kernel
        .syscalls()
        .spawn("nope", argv(&["nope"]), &ProcAttr::default())
        .unwrap_err();
    assert!(matches!(err, KernelError::SpawnFailure { .. }));
}

#[tokio::test]
async fn test_spawn_bad_numeric_descriptor() {
    let kernel = kernel();
    let attr = ProcAttr::new().with_files(vec![FileAttr::Numeric(77)]);
    let err = kernel
        .syscalls()
        .spawn("true", argv(&["true"]), &attr)
        .unwrap_err();
    match err {
        KernelError::SpawnFailure { source, .. } => {
            assert!(matches!(*source, KernelError::BadDescriptor(77)));
        }
        other => panic!("expected SpawnFailure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_live_process_limit() {
    let config = KernelConfig::default().with_max_processes(1);
    let kernel = Kernel::new(config).unwrap();
    let syscalls = kernel.syscalls();

    let first = syscalls
        .spawn("sleep", argv(&["sleep", "30"]), &ProcAttr::default())
        .unwrap();
    let err = syscalls
        .spawn("true", argv(&["true"]), &ProcAttr::default())
        .unwrap_err();
    match err {
        KernelError::SpawnFailure { source, .. } => {
            assert!(matches!(*source, KernelError::ResourceExhausted(_)));
        }
        other => panic!("expected SpawnFailure, got {other:?}"),
    }

    first.kill().unwrap();
    assert_eq!(
        first.wait().await.unwrap(),
        vproc_kernel::core::limits::KILLED_EXIT_CODE
    );
    syscalls
        .spawn("true", argv(&["true"]), &ProcAttr::default())
        .unwrap();
}
