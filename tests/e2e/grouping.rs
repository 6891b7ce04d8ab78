//! E2E tests for grouping mode
//!
//! Invocations without `--id` share one instance that collects everything
//! delivered within the grouping window and then stops listening.

use crate::common::harness::CliHarness;
use std::time::Duration;

/// First invocation starts an instance; the socket is there when it returns
#[test]
fn test_first_invocation_starts_instance() {
    let mut harness = CliHarness::new();
    let page = harness.write_file("a.html", "<h1>A</h1>");

    let output = harness.run(&["-p", page.to_str().unwrap()]);
    assert!(output.success(), "stderr: {}", output.stderr);
    assert!(harness.grouping_socket().exists());

    assert!(
        harness.wait_until(Duration::from_secs(5), |h| h
            .instance_logs()
            .contains("Window 'a.html' opened")),
        "logs: {}",
        harness.instance_logs()
    );
}

/// A second invocation within the window joins the running instance, which
/// closes its socket once deliveries stop
#[test]
fn test_burst_is_grouped_then_expires() {
    let mut harness = CliHarness::new();
    let b = harness.write_file("b.html", "<p>b</p>");
    let a = harness.write_file("a.html", "<p>a</p>");

    assert!(harness.run(&["-p", b.to_str().unwrap()]).success());
    let second = harness.run(&["-p", a.to_str().unwrap()]);
    assert!(second.success(), "stderr: {}", second.stderr);

    assert!(
        harness.wait_until(Duration::from_secs(5), |h| h
            .instance_logs()
            .contains("Showing 2 entries, added 'a.html'")),
        "logs: {}",
        harness.instance_logs()
    );

    assert!(
        harness.wait_until(Duration::from_secs(6), |h| !h.grouping_socket().exists()),
        "grouping socket should go away once idle"
    );
}

/// Piped content shows up under the name "stdin" unless one is given
#[test]
fn test_piped_content() {
    let mut harness = CliHarness::new();

    let output = harness.run_with_stdin(&[], Some("<p>piped</p>"));
    assert!(output.success(), "stderr: {}", output.stderr);

    let named = harness.run_with_stdin(&["-n", "Diff"], Some("<p>diff</p>"));
    assert!(named.success(), "stderr: {}", named.stderr);

    assert!(
        harness.wait_until(Duration::from_secs(5), |h| {
            let logs = h.instance_logs();
            logs.contains("Window 'stdin' opened") && logs.contains("added 'Diff'")
        }),
        "logs: {}",
        harness.instance_logs()
    );
}

/// A socket file nobody listens on does not block a new instance
#[test]
fn test_stale_socket_is_replaced() {
    let mut harness = CliHarness::new();
    drop(std::os::unix::net::UnixListener::bind(harness.grouping_socket()).unwrap());
    assert!(harness.grouping_socket().exists());

    let page = harness.write_file("a.html", "<p>a</p>");
    let output = harness.run(&["-p", page.to_str().unwrap()]);
    assert!(output.success(), "stderr: {}", output.stderr);
    assert!(std::os::unix::net::UnixStream::connect(harness.grouping_socket()).is_ok());
}

#[test]
fn test_missing_file_fails() {
    let mut harness = CliHarness::new();
    let missing = harness.runtime_dir().join("nope.html");

    let output = harness.run(&["-p", missing.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stderr.contains("Failed to read"), "stderr: {}", output.stderr);
    assert!(!harness.grouping_socket().exists());
}
