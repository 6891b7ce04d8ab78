//! Socket addressing and the client side of the protocol
//!
//! A display instance is found purely by its socket path. Grouping mode uses
//! one well-known path; named mode uses one path per handle under a
//! `windows/` subdirectory. A path whose listener does not answer is stale
//! and gets removed by whoever notices.

use std::io;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;

use crate::server::protocol::Command;

/// Environment variable overriding the runtime directory
pub const RUNTIME_DIR_ENV: &str = "VITRINE_RUNTIME_DIR";

/// Socket file for the grouping instance
pub const GROUPING_SOCKET_NAME: &str = "vitrine.sock";

/// Subdirectory holding one socket per named instance
pub const WINDOWS_DIR: &str = "windows";

const SOCKET_EXTENSION: &str = "sock";

/// How long a client waits for a listener before calling the address stale
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// How a CLI invocation picks its display instance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AddressMode {
    /// Shared instance collecting bursts of deliveries; expires when idle
    Grouping,
    /// Instance addressed by an opaque handle; lives until terminated
    Named(String),
}

impl AddressMode {
    pub fn handle(&self) -> Option<&str> {
        match self {
            Self::Grouping => None,
            Self::Named(handle) => Some(handle),
        }
    }
}

/// Resolves addressing modes to socket paths under one runtime directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketPaths {
    root: PathBuf,
}

impl SocketPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Paths under the current user's runtime directory
    pub fn from_environment() -> io::Result<Self> {
        Ok(Self::new(Self::runtime_dir()?))
    }

    /// Per-user directory holding the sockets
    pub fn runtime_dir() -> io::Result<PathBuf> {
        if let Some(dir) = std::env::var_os(RUNTIME_DIR_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        if let Some(dir) = dirs::runtime_dir() {
            return Ok(dir.join("vitrine"));
        }
        if let Some(home) = dirs::home_dir() {
            return Ok(home.join(".vitrine"));
        }
        let uid = nix::unistd::getuid();
        Ok(std::env::temp_dir().join(format!("vitrine-{}", uid)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn windows_dir(&self) -> PathBuf {
        self.root.join(WINDOWS_DIR)
    }

    /// Socket path for `mode`. Pure; the handle is used as-is.
    pub fn resolve(&self, mode: &AddressMode) -> PathBuf {
        match mode {
            AddressMode::Grouping => self.root.join(GROUPING_SOCKET_NAME),
            AddressMode::Named(handle) => self
                .windows_dir()
                .join(format!("{}.{}", handle, SOCKET_EXTENSION)),
        }
    }

    /// Create the runtime directory tree, private to the current user.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        for dir in [self.root.clone(), self.windows_dir()] {
            std::fs::DirBuilder::new()
                .recursive(true)
                .mode(0o700)
                .create(&dir)?;
            // `mode` only applies to directories that did not exist yet
            std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))?;
        }
        Ok(())
    }

    /// Handles of named instances that answer, removing stale sockets on
    /// the way. Returns the live handles and how many stale sockets went.
    pub fn live_named_instances(&self) -> io::Result<(Vec<String>, usize)> {
        let dir = self.windows_dir();
        if !dir.exists() {
            return Ok((Vec::new(), 0));
        }

        let mut live = Vec::new();
        let mut stale = 0;
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SOCKET_EXTENSION) {
                continue;
            }
            let Some(handle) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if is_listening(&path) {
                live.push(handle.to_string());
            } else {
                remove_stale(&path);
                stale += 1;
            }
        }
        live.sort();
        Ok((live, stale))
    }
}

/// Whether something accepts connections at `path`. Connects and closes
/// without sending anything.
pub fn is_listening(path: &Path) -> bool {
    std::os::unix::net::UnixStream::connect(path).is_ok()
}

/// Best-effort removal of a socket file nobody listens on
pub fn remove_stale(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!("Removed stale socket {:?}", path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::debug!("Failed to remove stale socket {:?}: {}", path, e),
    }
}

/// Deliver `command` to the instance listening at `path`.
///
/// Returns `true` once the record is written; nothing is read back. If the
/// connection cannot be made the address is stale: the socket file is
/// removed and `false` returned. A failure after connecting returns `false`
/// but leaves the file alone, since the listener may just be slow.
pub async fn try_send(path: &Path, command: &Command) -> bool {
    let mut stream = match tokio::time::timeout(CONNECT_TIMEOUT, UnixStream::connect(path)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            tracing::debug!("No instance at {:?}: {}", path, e);
            remove_stale(path);
            return false;
        }
        Err(_) => {
            tracing::debug!("Connecting to {:?} timed out", path);
            remove_stale(path);
            return false;
        }
    };

    let bytes = match command.encode() {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to encode {} command: {}", command.name(), e);
            return false;
        }
    };

    if let Err(e) = write_record(&mut stream, &bytes).await {
        tracing::warn!("Failed to send {} command to {:?}: {}", command.name(), path, e);
        return false;
    }

    tracing::debug!("Delivered {} command to {:?}", command.name(), path);
    true
}

async fn write_record(stream: &mut UnixStream, bytes: &[u8]) -> io::Result<()> {
    stream.write_all(bytes).await?;
    stream.flush().await?;
    stream.shutdown().await
}
