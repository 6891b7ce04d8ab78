//! Where display instances write their logs

use std::path::{Path, PathBuf};

use crate::server::daemon::is_process_running;

const LOG_PREFIX: &str = "vitrine-";
const LOG_SUFFIX: &str = ".log";

/// `<data-local-dir>/vitrine/logs`
pub fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("vitrine").join("logs"))
        .unwrap_or_else(|| std::env::temp_dir().join("vitrine-logs"))
}

/// Log file for the current display instance
pub fn instance_log_path() -> PathBuf {
    log_path_for_pid(&log_dir(), std::process::id())
}

fn log_path_for_pid(dir: &Path, pid: u32) -> PathBuf {
    dir.join(format!("{}{}{}", LOG_PREFIX, pid, LOG_SUFFIX))
}

fn pid_from_log_name(name: &str) -> Option<u32> {
    name.strip_prefix(LOG_PREFIX)?
        .strip_suffix(LOG_SUFFIX)?
        .parse()
        .ok()
}

/// Delete per-process logs left by instances that are no longer running.
pub fn cleanup_stale_logs() {
    cleanup_stale_logs_in(&log_dir());
}

fn cleanup_stale_logs_in(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(pid) = name.to_str().and_then(pid_from_log_name) else {
            continue;
        };
        if pid == std::process::id() || is_process_running(pid) {
            continue;
        }
        if std::fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }
    if removed > 0 {
        tracing::debug!("Removed {} stale log file(s) from {:?}", removed, dir);
    }
    removed
}
