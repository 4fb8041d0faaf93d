/*!
 * Flock Tests
 * Advisory locking through the lock dispatcher
 */

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use vproc_kernel::fs::{LockAction, LockError, OpenFile};
use vproc_kernel::process::ProcessContext;
use vproc_kernel::{
    Kernel, KernelConfig, KernelError, ProgramRegistry, LOCK_EX, LOCK_NB, LOCK_SH, LOCK_UN,
};

fn kernel() -> Kernel {
    Kernel::new(KernelConfig::default()).unwrap()
}

#[tokio::test]
async fn test_exclusive_unlock_exclusive() {
    let kernel = kernel();
    let syscalls = kernel.syscalls();
    let fid = syscalls.files().open("/var/lock/a", true).unwrap();
    syscalls.flock(fid, LOCK_EX).await.unwrap();
    syscalls.flock(fid, LOCK_UN).await.unwrap();
    syscalls.flock(fid, LOCK_EX).await.unwrap();
}

#[tokio::test]
async fn test_dup_shares_lock_ownership() {
    let kernel = kernel();
    let syscalls = kernel.syscalls();
    let fid = syscalls.files().open("/var/lock/b", true).unwrap();
    let dup = syscalls.files().dup(fid).unwrap();
    syscalls.flock(fid, LOCK_EX).await.unwrap();
    // Same open file description: re-locking through the duplicate succeeds
    syscalls.flock(dup, LOCK_EX | LOCK_NB).await.unwrap();
}

#[tokio::test]
async fn test_shared_locks_coexist_and_block_exclusive() {
    let kernel = kernel();
    let syscalls = kernel.syscalls();
    let a = syscalls.files().open("/var/lock/c", true).unwrap();
    let b = syscalls.files().open("/var/lock/c", false).unwrap();
    let c = syscalls.files().open("/var/lock/c", false).unwrap();

    syscalls.flock(a, LOCK_SH).await.unwrap();
    syscalls.flock(b, LOCK_SH | LOCK_NB).await.unwrap();
    let err = syscalls.flock(c, LOCK_EX | LOCK_NB).await.unwrap_err();
    assert!(matches!(
        err,
        KernelError::LockFailure(LockError::WouldBlock { .. })
    ));
}

#[tokio::test]
async fn test_close_releases_lock() {
    let kernel = kernel();
    let syscalls = kernel.syscalls();
    let a = syscalls.files().open("/var/lock/d", true).unwrap();
    let b = syscalls.files().open("/var/lock/d", false).unwrap();

    syscalls.flock(a, LOCK_EX).await.unwrap();
    assert!(syscalls.flock(b, LOCK_EX | LOCK_NB).await.is_err());
    syscalls.files().close(a).unwrap();
    syscalls.flock(b, LOCK_EX | LOCK_NB).await.unwrap();
}

#[tokio::test]
async fn test_blocking_request_times_out() {
    let config = KernelConfig::default().with_lock_wait_timeout(Duration::from_millis(50));
    let kernel = Kernel::new(config).unwrap();
    let syscalls = kernel.syscalls();
    let a = syscalls.files().open("/var/lock/e", true).unwrap();
    let b = syscalls.files().open("/var/lock/e", false).unwrap();

    syscalls.flock(a, LOCK_EX).await.unwrap();
    let started = Instant::now();
    let err = syscalls.flock(b, LOCK_EX).await.unwrap_err();
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert!(matches!(
        err,
        KernelError::LockFailure(LockError::Timeout { .. })
    ));
}

#[tokio::test]
async fn test_blocking_request_wakes_on_release() {
    let kernel = kernel();
    let syscalls = kernel.syscalls().clone();
    let a = syscalls.files().open("/var/lock/f", true).unwrap();
    let b = syscalls.files().open("/var/lock/f", false).unwrap();
    syscalls.flock(a, LOCK_EX).await.unwrap();

    let waiter = {
        let syscalls = syscalls.clone();
        tokio::spawn(async move { syscalls.flock(b, LOCK_EX).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    syscalls.flock(a, LOCK_UN).await.unwrap();
    waiter.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_waits_for_program_holding_lock() {
    let acquired = Arc::new(Notify::new());
    let programs = ProgramRegistry::with_builtins();
    {
        let acquired = Arc::clone(&acquired);
        programs.register("holder", move |ctx: ProcessContext| {
            let acquired = Arc::clone(&acquired);
            async move {
                let fid = match ctx.files.open("/var/lock/held", true) {
                    Ok(fid) => fid,
                    Err(_) => return 1,
                };
                if ctx.files.flock(fid, LockAction::Exclusive, true).await.is_err() {
                    return 1;
                }
                acquired.notify_one();
                tokio::time::sleep(Duration::from_millis(50)).await;
                match ctx.files.flock(fid, LockAction::Unlock, true).await {
                    Ok(()) => 0,
                    Err(_) => 1,
                }
            }
        });
    }
    let config = KernelConfig::default().with_lock_wait_timeout(Duration::from_secs(1));
    let kernel = Kernel::with_programs(config, programs).unwrap();
    let syscalls = kernel.syscalls();
    let fid = syscalls.files().open("/var/lock/held", true).unwrap();

    // Runs on the test's single-threaded runtime alongside the holder
    let holder = syscalls
        .spawn("holder", vec!["holder".into()], &Default::default())
        .unwrap();
    acquired.notified().await;

    let started = Instant::now();
    syscalls.flock(fid, LOCK_EX).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(holder.wait().await.unwrap(), 0);
}

#[tokio::test]
async fn test_invalid_code_and_descriptor() {
    let kernel = kernel();
    let syscalls = kernel.syscalls();
    let fid = syscalls.files().insert(OpenFile::null()).unwrap();
    assert!(matches!(
        syscalls.flock(fid, 3).await,
        Err(KernelError::InvalidArgument(_))
    ));
    assert!(matches!(
        syscalls.flock(500, LOCK_EX).await,
        Err(KernelError::BadDescriptor(500))
    ));
}
