/*!
 * Host Bridge Tests
 * spawn / exec / flock called with host argument lists
 */

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use vproc_kernel::api::process_to_value;
use vproc_kernel::{outcome_to_value, Kernel, KernelConfig, KernelError};

fn kernel() -> Kernel {
    Kernel::new(KernelConfig::default()).unwrap()
}

#[tokio::test]
async fn test_exec_prepends_command_to_argv() {
    let bridge = kernel().bridge();
    let outcome = bridge
        .exec(&[json!("echo"), json!(["hello", 42])])
        .unwrap()
        .await
        .unwrap();
    let value = outcome_to_value(&outcome);
    assert_eq!(value["stdout"], "hello 42\n");
    assert_eq!(value["stderr"], "");
    assert_eq!(value["exitCode"], 0);
    assert!(value["pid"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_exec_arity_and_shape() {
    let bridge = kernel().bridge();
    for args in [
        vec![json!("echo")],
        vec![json!("echo"), json!([]), json!({})],
        vec![],
    ] {
        assert!(matches!(
            bridge.exec(&args),
            Err(KernelError::InvalidArgument(_))
        ));
    }
    assert!(matches!(
        bridge.exec(&[json!("echo"), json!("not an array")]),
        Err(KernelError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_exec_value_reports_spawn_failure() {
    let bridge = kernel().bridge();
    let err = bridge
        .exec_value(&[json!("missing"), json!([])])
        .await
        .unwrap_err();
    assert_eq!(err["error_type"], "spawn_failure");
    assert_eq!(err["details"], "command_not_found");
}

#[tokio::test]
async fn test_spawn_requires_command() {
    let bridge = kernel().bridge();
    assert!(matches!(
        bridge.spawn(&[]),
        Err(KernelError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_spawn_missing_argv_with_options_rejected() {
    let bridge = kernel().bridge();
    let err = bridge
        .spawn(&[json!("echo"), Value::Null, json!({"stdio": ["pipe"]})])
        .unwrap_err();
    assert!(matches!(err, KernelError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_spawn_with_stdio_and_argv0() {
    let kernel = kernel();
    kernel.programs().register(
        "argv0",
        |ctx: vproc_kernel::ProcessContext| async move {
            let line = format!("{}\n", ctx.argv.join(" "));
            match ctx.print(line).await {
                Ok(()) => 0,
                Err(_) => 1,
            }
        },
    );
    let bridge = kernel.bridge();
    let process = bridge
        .spawn(&[
            json!("argv0"),
            json!(["a", "b"]),
            json!({"stdio": ["ignore", "pipe", "ignore"], "argv0": "renamed"}),
        ])
        .unwrap();

    let value = process_to_value(&process, 3);
    let fid = value["stdio"][1].as_u64().unwrap() as u32;
    assert_eq!(value["stdio"][0], Value::Null);

    let files = kernel.syscalls().files();
    let mut reader = files.raw_reader(fid).unwrap();
    files.close(fid).unwrap();
    assert_eq!(reader.read_to_end().await.unwrap(), b"renamed a b\n");
    assert_eq!(process.wait().await.unwrap(), 0);
}

#[tokio::test]
async fn test_spawn_without_options_inherits_stdio() {
    let kernel = kernel();
    let process = kernel
        .bridge()
        .spawn(&[json!("true"), json!([])])
        .unwrap();
    assert_eq!(process.argv(), &["true".to_string()]);
    assert_eq!(process.wait().await.unwrap(), 0);
}

#[tokio::test]
async fn test_flock_arguments() {
    let kernel = kernel();
    let fid = kernel.syscalls().files().open("/lock", true).unwrap();
    let bridge = kernel.bridge();

    bridge.flock(&[json!(fid), json!(2)]).await.unwrap();
    bridge.flock(&[json!(fid), json!(8)]).await.unwrap();
    bridge.flock(&[json!(fid as f64 + 0.5), json!(2)]).await.unwrap();

    for args in [
        vec![json!(fid)],
        vec![json!(fid), json!(2), json!(0)],
        vec![json!("x"), json!(2)],
        vec![json!(-1), json!(2)],
        vec![json!(fid), json!(0)],
    ] {
        assert!(
            matches!(
                bridge.flock(&args).await,
                Err(KernelError::InvalidArgument(_))
            ),
            "{args:?}"
        );
    }
}
