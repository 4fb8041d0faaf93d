/*!
 * Process Lifecycle Tests
 */

use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use vproc_kernel::core::limits::KILLED_EXIT_CODE;
use vproc_kernel::process::{ProcessContext, ProcessState};
use vproc_kernel::{KernelConfig, KernelError, ProcAttr, ProcessManager, ProgramRegistry};

fn manager_with(programs: ProgramRegistry) -> ProcessManager {
    ProcessManager::builder()
        .with_config(KernelConfig::default())
        .with_programs(programs)
        .build()
}

#[tokio::test]
async fn test_create_start_wait() {
    let pm = ProcessManager::new(KernelConfig::default());
    let init = pm.init_context().unwrap();
    let process = pm
        .create(&init, "exit", vec!["exit".into(), "7".into()], &ProcAttr::default())
        .unwrap();

    assert_eq!(process.state(), ProcessState::Created);
    assert!(process.exit_code().is_none());
    process.start().unwrap();
    assert_eq!(process.wait().await.unwrap(), 7);
    assert_eq!(process.state(), ProcessState::Exited);
    assert_eq!(process.exit_code(), Some(7));
    // Waiting again returns the same code
    assert_eq!(process.wait().await.unwrap(), 7);
}

#[tokio::test]
async fn test_wait_and_kill_before_start() {
    let pm = ProcessManager::new(KernelConfig::default());
    let init = pm.init_context().unwrap();
    let process = pm.create(&init, "true", vec![], &ProcAttr::default()).unwrap();
    assert!(matches!(
        process.wait().await,
        Err(KernelError::InvalidState(_))
    ));
    assert!(matches!(process.kill(), Err(KernelError::InvalidState(_))));
}

#[tokio::test]
async fn test_double_start_rejected() {
    let pm = ProcessManager::new(KernelConfig::default());
    let init = pm.init_context().unwrap();
    let process = pm.create(&init, "true", vec![], &ProcAttr::default()).unwrap();
    process.start().unwrap();
    assert!(matches!(process.start(), Err(KernelError::InvalidState(_))));
    process.wait().await.unwrap();
}

#[test]
fn test_start_without_runtime() {
    let pm = ProcessManager::new(KernelConfig::default());
    let init = pm.init_context().unwrap();
    let process = pm.create(&init, "true", vec![], &ProcAttr::default()).unwrap();
    assert!(matches!(process.start(), Err(KernelError::InvalidState(_))));
    assert_eq!(process.state(), ProcessState::Created);
}

#[tokio::test]
async fn test_kill_running_process() {
    let pm = ProcessManager::new(KernelConfig::default());
    let init = pm.init_context().unwrap();
    let process = pm
        .create(&init, "sleep", vec!["sleep".into(), "60".into()], &ProcAttr::default())
        .unwrap();
    process.start().unwrap();
    assert_eq!(pm.count(), 1);
    assert_eq!(pm.get(process.pid()).map(|p| p.pid()), Some(process.pid()));

    process.kill().unwrap();
    let code = tokio::time::timeout(Duration::from_secs(5), process.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(code, KILLED_EXIT_CODE);
    assert_eq!(pm.count(), 0);
    // Killing an exited process is a no-op
    process.kill().unwrap();
}

#[tokio::test]
async fn test_descriptors_closed_at_exit() {
    let programs = ProgramRegistry::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    programs.register("count-fds", move |ctx: ProcessContext| {
        let counter = Arc::clone(&counter);
        async move {
            counter.store(ctx.files.len(), Ordering::SeqCst);
            0
        }
    });
    let pm = manager_with(programs);
    let init = pm.init_context().unwrap();
    let process = pm
        .create(&init, "count-fds", vec![], &ProcAttr::default())
        .unwrap();
    process.start().unwrap();
    process.wait().await.unwrap();

    assert_eq!(seen.load(Ordering::SeqCst), 3);
    assert!(process.files().is_empty());
}

#[tokio::test]
async fn test_list_reports_running_processes() {
    let pm = ProcessManager::new(KernelConfig::default());
    let init = pm.init_context().unwrap();
    let a = pm
        .create(&init, "sleep", vec!["sleep".into(), "60".into()], &ProcAttr::default())
        .unwrap();
    let b = pm
        .create(&init, "sleep", vec!["sleep".into(), "60".into()], &ProcAttr::default())
        .unwrap();
    a.start().unwrap();
    b.start().unwrap();

    let infos = pm.list();
    assert_eq!(
        infos.iter().map(|i| i.pid).collect::<Vec<_>>(),
        vec![a.pid(), b.pid()]
    );
    assert!(infos.iter().all(|i| i.state == ProcessState::Running));
    assert!(infos.iter().all(|i| i.parent_pid == init.pid));

    a.kill().unwrap();
    b.kill().unwrap();
    a.wait().await.unwrap();
    b.wait().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_starts_respect_limit() {
    let config = KernelConfig::default().with_max_processes(2);
    let pm = ProcessManager::builder().with_config(config).build();
    let init = pm.init_context().unwrap();

    let processes: Vec<_> = (0..8)
        .map(|_| {
            pm.create(&init, "sleep", vec!["sleep".into(), "30".into()], &ProcAttr::default())
                .unwrap()
        })
        .collect();
    let starts: Vec<_> = processes
        .iter()
        .map(|process| {
            let process = Arc::clone(process);
            tokio::spawn(async move { process.start() })
        })
        .collect();

    let mut started = 0;
    for start in starts {
        match start.await.unwrap() {
            Ok(()) => started += 1,
            Err(KernelError::ResourceExhausted(_)) => {}
            Err(other) => panic!("unexpected start error: {other:?}"),
        }
    }
    assert_eq!(started, 2);
    assert_eq!(pm.count(), 2);

    for process in &processes {
        if process.state() == ProcessState::Running {
            process.kill().unwrap();
            assert_eq!(process.wait().await.unwrap(), KILLED_EXIT_CODE);
        }
    }
    assert_eq!(pm.count(), 0);
}
