//! Tracing subscriber setup for the two process roles
//!
//! CLI invocations are short-lived and talk to a terminal, so they log
//! warnings to stderr. Display instances run detached and log to a file.
//! `RUST_LOG` overrides the default filter in both cases.

use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, EnvFilter};

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Log to stderr for a CLI invocation.
pub fn init_cli() {
    let _ = fmt()
        .with_env_filter(filter("warn"))
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .try_init();
}

/// Log to `log_path`. Used by display instances and by `--log-file`.
pub fn init_instance(log_path: &Path) -> io::Result<()> {
    if let Some(dir) = log_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    let _ = fmt()
        .with_env_filter(filter("info"))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
    Ok(())
}
