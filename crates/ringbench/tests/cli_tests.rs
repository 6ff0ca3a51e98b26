//! Runs the `ringbench` binary and checks its output and exit codes.

use std::process::{Command, Output};

fn ringbench(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ringbench"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to launch ringbench")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

/// Checks `<label> <value> <unit>msgs/sec` with a two-decimal value.
fn assert_rate_line(line: &str, label: &str) {
    let mut parts = line.split(' ');
    assert_eq!(parts.next(), Some(label), "{line}");
    let value = parts.next().unwrap_or_default();
    let (_, decimals) = value.split_once('.').unwrap_or_default();
    assert_eq!(decimals.len(), 2, "{line}");
    assert!(value.parse::<f64>().is_ok(), "{line}");
    let unit = parts.next().unwrap_or_default();
    assert!(
        ["msgs/sec", "kmsgs/sec", "Mmsgs/sec"].contains(&unit),
        "{line}"
    );
    assert_eq!(parts.next(), None, "{line}");
}

#[test]
fn test_sink_prints_one_rate_line() {
    let out = ringbench(&["--mode", "sink", "--batchsize", "32", "--msgs", "1000000", "--no-pin", "--idle", "yield"]);
    assert!(out.status.success(), "{}", stderr(&out));

    let text = stdout(&out);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1, "{text}");
    assert_rate_line(lines[0], "Sink");
}

#[test]
fn test_forward_prints_forwarded_line() {
    let out = ringbench(&["--mode", "fw", "--batchsize", "1", "--msgs", "100", "--no-pin", "--idle", "yield"]);
    assert!(out.status.success(), "{}", stderr(&out));

    let text = stdout(&out);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1, "{text}");
    assert_rate_line(lines[0], "Forwarded");
}

#[test]
fn test_bootstrap_args_before_separator_are_ignored() {
    let out = ringbench(&["-l", "0-3", "--", "--mode", "fw-copy", "--msgs", "2000", "--no-pin", "--idle", "yield"]);
    assert!(out.status.success(), "{}", stderr(&out));
    assert_rate_line(stdout(&out).trim_end(), "Forwarded");
}

#[test]
fn test_batch_size_too_large_exits_with_usage() {
    let out = ringbench(&["--mode", "sink", "--batchsize", "200"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(stdout(&out).is_empty());
    let err = stderr(&out);
    assert!(err.contains("batch size 200"), "{err}");
    assert!(err.contains("usage:"), "{err}");
}

#[test]
fn test_target_below_batch_exits_with_usage() {
    let out = ringbench(&["--mode", "fw", "--batchsize", "32", "--msgs", "10"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(stdout(&out).is_empty());
    assert!(stderr(&out).contains("usage:"));
}

#[test]
fn test_missing_mode_exits_with_usage() {
    let out = ringbench(&[]);
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("--mode"));
}

#[test]
fn test_help_exits_cleanly() {
    let out = ringbench(&["--help"]);
    assert!(out.status.success());
    assert!(stdout(&out).starts_with("usage:"));
}

#[test]
fn test_run_failure_is_reported_with_logging_off() {
    let out = ringbench(&["--mode", "sink", "--cores", "999998,999999"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stdout(&out).is_empty());
    let err = stderr(&out);
    assert!(err.contains("error: resource exhausted: core"), "{err}");
    assert!(!err.contains("usage:"), "{err}");
}
