//! Launching detached display instances
//!
//! A CLI invocation that finds no instance starts one in its own session,
//! hands it the content through command-line arguments, and waits only until
//! the instance's socket shows up on disk. Because the dispatcher binds
//! before anything else happens, the socket file appearing means the
//! instance already accepts deliveries.

use std::ffi::OsString;
use std::io::{self, Write};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;

use crate::model::ContentEntry;
use crate::server::ipc::AddressMode;

/// Marks a process as the detached display instance
pub const DISPLAY_HOST_FLAG: &str = "--display-host";

/// Tells the instance to delete its content file after reading it
pub const TEMP_FILE_FLAG: &str = "--temp-file";

pub const READY_TIMEOUT: Duration = Duration::from_secs(5);
pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Check if a process is running
pub fn is_process_running(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        // Exists, but belongs to someone else
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Where the detached instance reads its initial content from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    /// A file the user named; left alone
    File(PathBuf),
    /// A temporary file holding piped content; the instance deletes it
    TempFile(PathBuf),
}

impl ContentSource {
    pub fn path(&self) -> &Path {
        match self {
            Self::File(path) | Self::TempFile(path) => path,
        }
    }
}

/// Everything a detached instance needs to rebuild the invocation's entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handoff {
    pub source: ContentSource,
    /// Display name given explicitly on the command line
    pub name: Option<String>,
    pub mode: AddressMode,
    /// Config file given on the command line
    pub config_path: Option<PathBuf>,
}

impl Handoff {
    /// Prepare the handoff for `entry`. Piped content (no path) is written
    /// to a fresh temporary file that the instance removes after reading.
    pub fn prepare(
        entry: &ContentEntry,
        name: Option<&str>,
        mode: &AddressMode,
    ) -> io::Result<Self> {
        let source = if entry.has_path() {
            ContentSource::File(PathBuf::from(&entry.path))
        } else {
            ContentSource::TempFile(write_temp_content(&entry.content)?)
        };
        Ok(Self {
            source,
            name: name.map(str::to_string),
            mode: mode.clone(),
            config_path: None,
        })
    }

    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Arguments for the instance process
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![DISPLAY_HOST_FLAG.into()];
        args.push("--path".into());
        args.push(self.source.path().as_os_str().to_owned());
        if let ContentSource::TempFile(_) = self.source {
            args.push(TEMP_FILE_FLAG.into());
        }
        if let Some(name) = &self.name {
            args.push("--name".into());
            args.push(name.into());
        }
        if let Some(handle) = self.mode.handle() {
            args.push("--id".into());
            args.push(handle.into());
        }
        if let Some(config) = &self.config_path {
            args.push("--config".into());
            args.push(config.as_os_str().to_owned());
        }
        args
    }

    /// Remove the temporary content file, if any. Used when the instance
    /// never got to read it.
    pub fn discard(&self) {
        if let ContentSource::TempFile(path) = &self.source {
            let _ = std::fs::remove_file(path);
        }
    }
}

fn write_temp_content(content: &str) -> io::Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix("vitrine-")
        .suffix(".html")
        .tempfile()?;
    file.write_all(content.as_bytes())?;
    file.flush()?;
    file.into_temp_path().keep().map_err(|e| e.error)
}

/// Starts detached display instances and waits for them to be reachable
#[derive(Debug, Clone)]
pub struct Spawner {
    program: PathBuf,
    ready_timeout: Duration,
    poll_interval: Duration,
}

impl Spawner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ready_timeout: READY_TIMEOUT,
            poll_interval: READY_POLL_INTERVAL,
        }
    }

    /// Spawner that re-runs the current executable
    pub fn current_exe() -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Start `args` in a new session with stdin and stdout detached.
    /// Stderr stays connected so startup errors reach the user.
    pub fn spawn_detached(&self, args: &[OsString]) -> io::Result<Child> {
        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        // SAFETY: setsid is async-signal-safe and touches no parent state
        unsafe {
            command.pre_exec(|| {
                nix::unistd::setsid()?;
                Ok(())
            });
        }

        command.spawn().map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("Failed to start {}: {}", self.program.display(), e),
            )
        })
    }

    /// Launch an instance for `handoff` and block until `socket_path`
    /// exists or the readiness timeout passes. Returns the child's PID.
    pub fn spawn_and_await_ready(&self, handoff: &Handoff, socket_path: &Path) -> io::Result<u32> {
        let mut child = match self.spawn_detached(&handoff.to_args()) {
            Ok(child) => child,
            Err(e) => {
                handoff.discard();
                return Err(e);
            }
        };
        let pid = child.id();
        tracing::debug!("Spawned display instance {} for {:?}", pid, socket_path);

        await_ready(socket_path, &mut child, self.ready_timeout, self.poll_interval)?;
        tracing::debug!("Display instance {} is ready", pid);
        Ok(pid)
    }
}

/// Poll until `socket_path` exists.
///
/// Fails with [`io::ErrorKind::TimedOut`] once `timeout` has passed, and
/// fails if the socket appears but `child` has already exited with an
/// error: some other instance owns the socket and this delivery was lost.
pub fn await_ready(
    socket_path: &Path,
    child: &mut Child,
    timeout: Duration,
    poll_interval: Duration,
) -> io::Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        if socket_path.exists() {
            if let Some(status) = child.try_wait()? {
                if !status.success() {
                    return Err(io::Error::other(format!(
                        "Display instance exited during startup ({})",
                        status
                    )));
                }
            }
            return Ok(());
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!(
                    "Display instance did not create {:?} within {:?}",
                    socket_path, timeout
                ),
            ));
        }
        std::thread::sleep(poll_interval.min(deadline - now));
    }
}
