//! E2E tests for `--cmd`

use crate::common::harness::CliHarness;

#[test]
fn test_config_show_uses_given_file() {
    let mut harness = CliHarness::new();
    let config = harness.write_file("config.json", r#"{"font_size": 18}"#);

    let output = harness.run(&["--cmd", "config", "show", "--config", config.to_str().unwrap()]);
    assert!(output.success(), "stderr: {}", output.stderr);
    let shown: serde_json::Value = serde_json::from_str(&output.stdout).unwrap();
    assert_eq!(shown["font_size"], 18);
    assert_eq!(shown["default_width"], 0);
}

#[test]
fn test_config_show_rejects_broken_file() {
    let mut harness = CliHarness::new();
    let config = harness.write_file("config.json", "{broken");

    let output = harness.run(&["--cmd", "config", "show", "--config", config.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_config_schema() {
    let mut harness = CliHarness::new();

    let output = harness.run(&["--cmd", "config", "schema"]);
    assert!(output.success());
    let schema: serde_json::Value = serde_json::from_str(&output.stdout).unwrap();
    assert!(schema["properties"].get("chrome_css").is_some());
}

#[test]
fn test_config_paths() {
    let mut harness = CliHarness::new();

    let output = harness.run(&["--cmd", "config", "paths"]);
    assert!(output.success());
    assert!(output
        .stdout
        .contains(&harness.runtime_dir().display().to_string()));
    assert!(output.stdout.contains("state.json"));
}

#[test]
fn test_list_cleans_stale_sockets() {
    let mut harness = CliHarness::new();
    let windows = harness.runtime_dir().join("windows");
    std::fs::create_dir_all(&windows).unwrap();
    let stale = windows.join("dead.sock");
    drop(std::os::unix::net::UnixListener::bind(&stale).unwrap());

    let output = harness.run(&["--cmd", "list"]);
    assert!(output.success());
    assert!(output.stdout.contains("No named instances."));
    assert!(output.stderr.contains("Cleaned up 1 stale socket(s)."));
    assert!(!stale.exists());
}

#[test]
fn test_unknown_command() {
    let mut harness = CliHarness::new();

    let output = harness.run(&["--cmd", "frobnicate"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stderr.contains("Unknown command"));
}
