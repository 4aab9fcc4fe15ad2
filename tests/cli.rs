use std::process::{Command, Output};

const USAGE_LINE: &str = "Usage: gatt-battery-query [-a|--address aa:bb:cc:dd:ee:ff]";

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gatt-battery-query"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to launch gatt-battery-query")
}

fn assert_usage_exit(args: &[&str]) {
    let output = run(args);
    assert_eq!(output.status.code(), Some(1), "args {:?}", args);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(USAGE_LINE), "args {:?}, stderr: {}", args, stderr);
}

#[test]
fn missing_address_value_prints_usage() {
    assert_usage_exit(&["-a"]);
}

#[test]
fn malformed_address_prints_usage() {
    assert_usage_exit(&["--address", "zz:11"]);
}

#[test]
fn unknown_flag_prints_usage() {
    assert_usage_exit(&["-x"]);
}
