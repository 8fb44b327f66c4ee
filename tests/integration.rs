//! Integration tests for vmsh.
//!
//! These require a built `vmsh` binary. Run with `cargo test`.

use std::io::Write;
use std::process::{Command, Output, Stdio};

fn vmsh(args: &[&str]) -> Output {
    Command::new("cargo")
        .args(["run", "--quiet", "--"])
        .args(args)
        .output()
        .expect("failed to run vmsh")
}

fn vmsh_repl(args: &[&str], input: &str) -> Output {
    let mut child = Command::new("cargo")
        .args(["run", "--quiet", "--"])
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to start vmsh");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(input.as_bytes())
        .expect("failed to write repl input");
    child.wait_with_output().expect("failed to wait for vmsh")
}

#[test]
fn test_dry_run_exec_prints_the_command_vector() {
    let output = vmsh(&["--dry-run", "exec", "list"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("dry-run: lxc list"),
        "expected dry-run audit line, got: {stdout}"
    );
}

#[test]
fn test_dry_run_exec_respects_backend_override() {
    let output = vmsh(&["--dry-run", "--backend", "incus", "exec", "list"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("dry-run: incus list"), "got: {stdout}");
}

#[test]
fn test_exec_runs_the_backend_and_captures_output() {
    // Point the backend at /bin/echo so the vector executes for real.
    let output = vmsh(&["--backend", "/bin/echo", "exec", "hello"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("hello"), "got: {stdout}");
}

#[test]
fn test_exec_missing_backend_reports_spawn_failure() {
    let output = vmsh(&["--backend", "/definitely/not/a/binary", "exec", "list"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to spawn"), "got: {stderr}");
}

#[test]
fn test_repl_dry_run_toggle_gates_execution() {
    let output = vmsh_repl(&[], "dry-run on\nlist\nexit\n");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("dry-run enabled"), "got: {stdout}");
    assert!(stdout.contains("dry-run: lxc list"), "got: {stdout}");
}

#[test]
fn test_repl_dry_run_shell_session_is_printed_not_spawned() {
    let output = vmsh_repl(&["--dry-run"], "shell box1\nquit\n");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("dry-run: lxc exec box1 -- /bin/bash -l"),
        "got: {stdout}"
    );
}

#[test]
fn test_repl_delete_is_stop_then_delete() {
    let output = vmsh_repl(&["--dry-run"], "delete box1\nexit\n");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stop = stdout.find("dry-run: lxc stop box1");
    let delete = stdout.find("dry-run: lxc delete box1");
    assert!(stop.is_some() && delete.is_some(), "got: {stdout}");
    assert!(stop < delete, "stop must precede delete: {stdout}");
}

#[test]
fn test_repl_proxy_add_vector() {
    let output = vmsh_repl(
        &["--dry-run"],
        "proxy add box1 web tcp:0.0.0.0:8080 tcp:127.0.0.1:80\nexit\n",
    );
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains(
            "dry-run: lxc config device add box1 web proxy listen=tcp:0.0.0.0:8080 connect=tcp:127.0.0.1:80"
        ),
        "got: {stdout}"
    );
}

#[test]
fn test_repl_unknown_command_keeps_the_loop_alive() {
    let output = vmsh_repl(&["--dry-run"], "frobnicate\nlist\nexit\n");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("unknown command: frobnicate"), "got: {stdout}");
    // The loop kept going and served the next command.
    assert!(stdout.contains("dry-run: lxc list"), "got: {stdout}");
}

#[test]
fn test_repl_exits_on_eof() {
    let output = vmsh_repl(&[], "");
    assert!(output.status.success());
}

#[test]
fn test_completions_bash() {
    let output = vmsh(&["completions", "bash"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("vmsh"), "got: {stdout}");
}
