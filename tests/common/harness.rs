//! Runs the real `vitrine` binary against an isolated runtime directory
//!
//! Every harness gets its own temp dir holding the runtime directory, the
//! config and data homes, and the captured stderr of each invocation.
//! Display instances started during a test are terminated on drop.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tempfile::TempDir;

/// Result of one CLI invocation
#[derive(Debug)]
pub struct RunOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

pub struct CliHarness {
    temp: TempDir,
    runs: usize,
}

impl CliHarness {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        for dir in ["runtime", "config", "data", "files"] {
            fs::create_dir_all(temp.path().join(dir)).unwrap();
        }
        Self { temp, runs: 0 }
    }

    pub fn runtime_dir(&self) -> PathBuf {
        self.temp.path().join("runtime")
    }

    pub fn config_home(&self) -> PathBuf {
        self.temp.path().join("config")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.temp.path().join("data").join("vitrine").join("logs")
    }

    pub fn grouping_socket(&self) -> PathBuf {
        self.runtime_dir().join("vitrine.sock")
    }

    pub fn named_socket(&self, id: &str) -> PathBuf {
        self.runtime_dir().join("windows").join(format!("{}.sock", id))
    }

    /// Write a content file and return its path
    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp.path().join("files").join(name);
        fs::write(&path, content).unwrap();
        path
    }

    /// `vitrine` with the environment pointed at this harness
    pub fn command(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_vitrine"));
        command
            .env("VITRINE_RUNTIME_DIR", self.runtime_dir())
            .env("XDG_CONFIG_HOME", self.config_home())
            .env("XDG_DATA_HOME", self.temp.path().join("data"))
            .env("RUST_LOG", "info");
        command
    }

    /// Run to completion. Stderr goes to a file: a spawned instance inherits
    /// it and would keep a pipe open for as long as it runs.
    pub fn run(&mut self, args: &[&str]) -> RunOutput {
        self.run_with_stdin(args, None)
    }

    pub fn run_with_stdin(&mut self, args: &[&str], stdin: Option<&str>) -> RunOutput {
        self.runs += 1;
        let stderr_path = self.temp.path().join(format!("stderr-{}.txt", self.runs));
        let stderr_file = fs::File::create(&stderr_path).unwrap();

        let mut child = self
            .command()
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(stderr_file)
            .spawn()
            .unwrap();
        if let Some(input) = stdin {
            let mut pipe = child.stdin.take().unwrap();
            pipe.write_all(input.as_bytes()).unwrap();
        }
        let output = child.wait_with_output().unwrap();

        RunOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: fs::read_to_string(&stderr_path).unwrap_or_default(),
        }
    }

    /// Everything display instances have logged so far
    pub fn instance_logs(&self) -> String {
        let Ok(entries) = fs::read_dir(self.log_dir()) else {
            return String::new();
        };
        let mut logs = String::new();
        for entry in entries.flatten() {
            logs.push_str(&fs::read_to_string(entry.path()).unwrap_or_default());
        }
        logs
    }

    /// PIDs of instances that wrote a log file
    fn instance_pids(&self) -> Vec<i32> {
        let Ok(entries) = fs::read_dir(self.log_dir()) else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                name.strip_prefix("vitrine-")?
                    .strip_suffix(".log")?
                    .parse()
                    .ok()
            })
            .collect()
    }

    /// Send SIGTERM to every instance started by this harness
    pub fn terminate_instances(&self) {
        for pid in self.instance_pids() {
            let _ = kill(Pid::from_raw(pid), Signal::SIGTERM);
        }
    }

    /// Poll `condition` until it holds or `timeout` passes
    pub fn wait_until(&self, timeout: Duration, mut condition: impl FnMut(&Self) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if condition(self) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}

impl Drop for CliHarness {
    fn drop(&mut self) {
        self.terminate_instances();
    }
}
