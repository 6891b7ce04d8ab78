//! E2E tests for named windows (`--id`)

use crate::common::harness::CliHarness;
use std::time::Duration;

/// `--id new` prints a fresh id; later invocations with that id replace the
/// content, and the window outlives the grouping window
#[test]
fn test_named_window_lifecycle() {
    let mut harness = CliHarness::new();
    let page = harness.write_file("log.html", "<p>v1</p>");

    let output = harness.run(&["--id", "new", "-p", page.to_str().unwrap()]);
    assert!(output.success(), "stderr: {}", output.stderr);
    let id = output.stdout.trim().to_string();
    assert!(uuid::Uuid::parse_str(&id).is_ok(), "stdout: {}", output.stdout);
    assert!(harness.named_socket(&id).exists());

    std::fs::write(&page, "<p>v2</p>").unwrap();
    let update = harness.run(&["--id", id.as_str(), "-p", page.to_str().unwrap()]);
    assert!(update.success(), "stderr: {}", update.stderr);
    assert!(update.stdout.is_empty());

    assert!(
        harness.wait_until(Duration::from_secs(5), |h| h
            .instance_logs()
            .contains("Showing 'log.html' (1 entries)")),
        "logs: {}",
        harness.instance_logs()
    );

    std::thread::sleep(Duration::from_millis(2500));
    assert!(harness.named_socket(&id).exists());

    let list = harness.run(&["--cmd", "list"]);
    assert!(list.success());
    assert!(list.stdout.contains(&format!("  {}", id)), "stdout: {}", list.stdout);

    harness.terminate_instances();
    assert!(
        harness.wait_until(Duration::from_secs(5), |h| !h.named_socket(&id).exists()),
        "terminated instance should remove its socket"
    );
}

/// Two different ids are two independent windows
#[test]
fn test_ids_are_independent() {
    let mut harness = CliHarness::new();
    let page = harness.write_file("a.html", "<p>a</p>");
    let path = page.to_str().unwrap();

    let first = harness.run(&["--id", "new", "-p", path]);
    let second = harness.run(&["--id", "new", "-p", path]);
    assert!(first.success() && second.success());

    let first_id = first.stdout.trim();
    let second_id = second.stdout.trim();
    assert_ne!(first_id, second_id);
    assert!(harness.named_socket(first_id).exists());
    assert!(harness.named_socket(second_id).exists());
}

/// An id that was never created starts a window under that id
#[test]
fn test_unknown_id_starts_window() {
    let mut harness = CliHarness::new();
    let page = harness.write_file("a.html", "<p>a</p>");
    let id = "2f1c6a0e-8d4b-4c1e-9f5a-3b7d2e6c9a10";

    let output = harness.run(&["--id", id, "-p", page.to_str().unwrap()]);
    assert!(output.success(), "stderr: {}", output.stderr);
    assert!(output.stdout.is_empty());
    assert!(harness.named_socket(id).exists());
}

#[test]
fn test_invalid_id_is_rejected() {
    let mut harness = CliHarness::new();
    let page = harness.write_file("a.html", "<p>a</p>");

    let output = harness.run(&["--id", "../escape", "-p", page.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stderr.contains("Invalid window id"), "stderr: {}", output.stderr);
    assert!(!harness.runtime_dir().join("windows").exists());
}
