//! Server side of the protocol: one listening socket per display instance
//!
//! The socket is bound when the dispatcher is created, so the socket file
//! appearing on disk means connections are already accepted. Each accepted
//! connection carries one [`Command`] and is handled in its own task.
//!
//! Grouping instances use the [`Lifecycle::Expiring`] policy: every accepted
//! connection pushes the idle deadline back, and when the deadline passes the
//! dispatcher closes itself. Named instances are [`Lifecycle::Persistent`].

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::display::DisplayEvent;
use crate::server::grouping_timer::{GroupingTimer, GROUPING_WINDOW};
use crate::server::ipc::{is_listening, AddressMode};
use crate::server::protocol::{Command, MAX_COMMAND_BYTES};
use crate::state::AppState;

/// How long a connection may take to deliver its record
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// When a dispatcher shuts itself down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Close after an idle grouping window with no connections
    Expiring,
    /// Stay up until closed explicitly
    Persistent,
}

impl From<&AddressMode> for Lifecycle {
    fn from(mode: &AddressMode) -> Self {
        match mode {
            AddressMode::Grouping => Lifecycle::Expiring,
            AddressMode::Named(_) => Lifecycle::Persistent,
        }
    }
}

/// Configuration for a dispatcher
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub socket_path: PathBuf,
    pub lifecycle: Lifecycle,
    /// Idle window for [`Lifecycle::Expiring`]
    pub grouping_window: Duration,
}

impl DispatcherConfig {
    pub fn new(socket_path: impl Into<PathBuf>, lifecycle: Lifecycle) -> Self {
        Self {
            socket_path: socket_path.into(),
            lifecycle,
            grouping_window: GROUPING_WINDOW,
        }
    }

    pub fn with_grouping_window(mut self, window: Duration) -> Self {
        self.grouping_window = window;
        self
    }
}

/// Handle to a bound dispatcher. Clones share the same socket.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    socket_path: PathBuf,
    lifecycle: Lifecycle,
    state: Arc<AppState>,
    events: Option<mpsc::UnboundedSender<DisplayEvent>>,
    /// Bound listener until `start` moves it into the accept task
    listener: Mutex<Option<std::os::unix::net::UnixListener>>,
    timer: Option<GroupingTimer>,
    closed: AtomicBool,
    closed_tx: watch::Sender<bool>,
}

impl Dispatcher {
    /// Bind the socket at `config.socket_path`.
    ///
    /// A stale socket file is replaced. If another listener answers at that
    /// path this fails with [`io::ErrorKind::AddrInUse`].
    pub fn bind(
        config: DispatcherConfig,
        state: Arc<AppState>,
        events: Option<mpsc::UnboundedSender<DisplayEvent>>,
    ) -> io::Result<Self> {
        let listener = bind_listener(&config.socket_path)?;
        tracing::info!(
            "Dispatcher listening on {:?} ({:?})",
            config.socket_path,
            config.lifecycle
        );

        let timer = match config.lifecycle {
            Lifecycle::Expiring => Some(GroupingTimer::new(config.grouping_window)),
            Lifecycle::Persistent => None,
        };
        let (closed_tx, _) = watch::channel(false);

        Ok(Self {
            inner: Arc::new(Inner {
                socket_path: config.socket_path,
                lifecycle: config.lifecycle,
                state,
                events,
                listener: Mutex::new(Some(listener)),
                timer,
                closed: AtomicBool::new(false),
                closed_tx,
            }),
        })
    }

    /// Start accepting connections. Must be called from within a tokio
    /// runtime, and only once.
    pub fn start(&self) -> io::Result<JoinHandle<()>> {
        let std_listener = self
            .inner
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| io::Error::other("Dispatcher already started or closed"))?;
        let listener = UnixListener::from_std(std_listener)?;

        Inner::touch(&self.inner);
        let inner = self.inner.clone();
        Ok(tokio::spawn(accept_loop(inner, listener)))
    }

    /// Stop accepting connections and remove the socket file. Safe to call
    /// any number of times from any thread.
    pub fn close(&self) {
        self.inner.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Resolve once the dispatcher has closed.
    pub async fn wait_closed(&self) {
        let mut rx = self.inner.closed_tx.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Apply one command to the application state and forward the
    /// resulting snapshot to the display layer.
    pub fn apply(&self, command: Command) -> DisplayEvent {
        self.inner.apply(command)
    }

    pub fn socket_path(&self) -> &Path {
        &self.inner.socket_path
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.lifecycle
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.inner.state
    }
}

impl Inner {
    /// Push the idle deadline back (expiring dispatchers only).
    fn touch(this: &Arc<Self>) {
        let Some(timer) = &this.timer else {
            return;
        };
        let weak: Weak<Self> = Arc::downgrade(this);
        timer.reset(move || {
            if let Some(inner) = weak.upgrade() {
                tracing::info!("No deliveries within the grouping window, closing");
                inner.close();
            }
        });
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(timer) = &self.timer {
            timer.stop();
        }
        // Listener is still here if `start` never ran
        drop(
            self.listener
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        // Remove the file before the accept task lets go of the socket, so a
        // newer instance can bind the path right away.
        match std::fs::remove_file(&self.socket_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove socket {:?}: {}", self.socket_path, e),
        }
        self.closed_tx.send_replace(true);
        tracing::info!("Dispatcher at {:?} closed", self.socket_path);
    }

    async fn handle_connection(&self, mut stream: UnixStream) {
        let bytes = match tokio::time::timeout(READ_TIMEOUT, read_record(&mut stream)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                tracing::debug!("Dropping connection: {}", e);
                return;
            }
            Err(_) => {
                tracing::debug!("Dropping connection: no record within {:?}", READ_TIMEOUT);
                return;
            }
        };

        match Command::decode(&bytes) {
            Ok(command) => {
                tracing::debug!("Received {} command", command.name());
                self.apply(command);
            }
            Err(e) => tracing::debug!("Dropping malformed command: {}", e),
        }
    }

    fn apply(&self, command: Command) -> DisplayEvent {
        let event = match command {
            Command::AddEntry { entry } => {
                let snapshot = self.state.append(entry);
                DisplayEvent::EntryAdded {
                    entries: snapshot.entries,
                    index: snapshot.index,
                    current_index: snapshot.current,
                }
            }
            Command::ReplaceEntry {
                path,
                content,
                name,
            } => {
                let snapshot = self.state.replace_or_append(&path, &content, &name);
                DisplayEvent::ContentReplaced {
                    entries: snapshot.entries,
                    current_index: snapshot.current,
                }
            }
        };

        if let Some(events) = &self.events {
            if events.send(event.clone()).is_err() {
                tracing::debug!("Display layer is gone, event dropped");
            }
        }
        event
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.close();
    }
}

async fn accept_loop(inner: Arc<Inner>, listener: UnixListener) {
    let mut closed_rx = inner.closed_tx.subscribe();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _addr)) => {
                    // Any connection counts as activity, even one that
                    // turns out to be malformed.
                    Inner::touch(&inner);
                    let inner = inner.clone();
                    tokio::spawn(async move {
                        inner.handle_connection(stream).await;
                    });
                }
                Err(e) => {
                    if inner.closed.load(Ordering::SeqCst) {
                        break;
                    }
                    tracing::warn!("Accept error: {}", e);
                }
            },
            _ = closed_rx.wait_for(|closed| *closed) => break,
        }
    }

    tracing::debug!("Accept loop for {:?} finished", inner.socket_path);
}

/// Read the whole record; the sender closes its side when done.
async fn read_record(stream: &mut UnixStream) -> io::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let limit = MAX_COMMAND_BYTES as u64 + 1;
    (&mut *stream).take(limit).read_to_end(&mut bytes).await?;
    if bytes.len() > MAX_COMMAND_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Command larger than {} bytes", MAX_COMMAND_BYTES),
        ));
    }
    Ok(bytes)
}

fn bind_listener(socket_path: &Path) -> io::Result<std::os::unix::net::UnixListener> {
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if let Ok(metadata) = std::fs::symlink_metadata(socket_path) {
        if is_listening(socket_path) {
            return Err(io::Error::new(
                io::ErrorKind::AddrInUse,
                format!("Another instance is listening on {:?}", socket_path),
            ));
        }
        if metadata.file_type().is_symlink() {
            return Err(io::Error::other(format!(
                "Socket path {:?} is a symlink, refusing to replace it",
                socket_path
            )));
        }
        tracing::info!("Removing stale socket {:?}", socket_path);
        std::fs::remove_file(socket_path)?;
    }

    let listener = std::os::unix::net::UnixListener::bind(socket_path).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("Failed to bind socket {:?}: {}", socket_path, e),
        )
    })?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}
