//! The detached display instance
//!
//! Ties a [`Dispatcher`] to a [`DisplayHost`]: binds the socket, opens the
//! window with the invocation's content, then forwards every state change
//! to the host until the instance is told to go away.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::config::Config;
use crate::display::{DisplayEvent, DisplayHost, WindowSetup};
use crate::geometry::{
    position_is_visible, window_dimensions, window_position, GeometryRecorder, StateStore,
    WindowState, MACOS_TITLE_BAR_HEIGHT,
};
use crate::model::ContentEntry;
use crate::server::dispatcher::{Dispatcher, DispatcherConfig, Lifecycle};
use crate::server::grouping_timer::GROUPING_WINDOW;
use crate::server::ipc::{AddressMode, SocketPaths};
use crate::state::AppState;

/// How often the window geometry is sampled for saving
const GEOMETRY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for a display instance
#[derive(Debug, Clone)]
pub struct InstanceConfig {
    /// Content the invocation that started this instance brought along
    pub entry: ContentEntry,
    pub mode: AddressMode,
    pub socket_paths: SocketPaths,
    pub config: Config,
    /// Where window geometry is restored from and saved to
    pub state_store: Option<StateStore>,
    pub grouping_window: Duration,
    /// Exit as soon as the dispatcher closes. Used when nobody can close
    /// the window by hand.
    pub exit_on_dispatcher_close: bool,
}

impl InstanceConfig {
    pub fn new(entry: ContentEntry, mode: AddressMode, socket_paths: SocketPaths) -> Self {
        Self {
            entry,
            mode,
            socket_paths,
            config: Config::default(),
            state_store: None,
            grouping_window: GROUPING_WINDOW,
            exit_on_dispatcher_close: false,
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_state_store(mut self, store: StateStore) -> Self {
        self.state_store = Some(store);
        self
    }

    pub fn with_grouping_window(mut self, window: Duration) -> Self {
        self.grouping_window = window;
        self
    }

    pub fn exit_on_dispatcher_close(mut self, exit: bool) -> Self {
        self.exit_on_dispatcher_close = exit;
        self
    }
}

/// A bound display instance, ready to run
pub struct DisplayInstance<H: DisplayHost> {
    config: InstanceConfig,
    host: H,
    state: Arc<AppState>,
    dispatcher: Dispatcher,
    events: mpsc::UnboundedReceiver<DisplayEvent>,
}

impl<H: DisplayHost> DisplayInstance<H> {
    /// Bind the instance's socket. When this returns the socket file exists
    /// and deliveries queue up until [`DisplayInstance::run`] starts.
    pub fn new(config: InstanceConfig, host: H) -> io::Result<Self> {
        config.socket_paths.ensure_dirs()?;
        let socket_path = config.socket_paths.resolve(&config.mode);

        let state = Arc::new(AppState::new(config.entry.clone()));
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::bind(
            DispatcherConfig::new(socket_path, Lifecycle::from(&config.mode))
                .with_grouping_window(config.grouping_window),
            state.clone(),
            Some(tx),
        )?;

        Ok(Self {
            config,
            host,
            state,
            dispatcher,
            events: rx,
        })
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Open the window and serve deliveries until `shutdown` resolves, the
    /// window is closed, or (if configured) the dispatcher closes itself.
    /// Returns the host once the socket is gone.
    pub async fn run<F>(mut self, shutdown: F) -> io::Result<H>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(
            "Display instance starting for '{}' ({:?})",
            self.config.entry.name,
            self.config.mode
        );

        let saved = self.config.state_store.as_ref().and_then(StateStore::load);
        open_window(&mut self.host, &self.config, &self.state, saved.as_ref());
        let accept = self.dispatcher.start()?;

        let mut recorder = self.config.state_store.clone().map(GeometryRecorder::new);
        let mut tick = tokio::time::interval(GEOMETRY_POLL_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let exit_on_close = self.config.exit_on_dispatcher_close;
        let dispatcher = self.dispatcher.clone();
        let closed = dispatcher.wait_closed();
        tokio::pin!(shutdown);
        tokio::pin!(closed);

        loop {
            tokio::select! {
                Some(event) = self.events.recv() => self.host.show(&event),
                _ = tick.tick() => {
                    record_geometry(&self.host, recorder.as_mut());
                    if !self.host.is_open() {
                        tracing::info!("Window closed");
                        break;
                    }
                }
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break;
                }
                _ = &mut closed, if exit_on_close => {
                    tracing::info!("Dispatcher closed, exiting");
                    break;
                }
            }
        }

        self.dispatcher.close();
        if let Err(e) = accept.await {
            tracing::warn!("Accept task failed: {}", e);
        }
        // Connections accepted before closing may still have applied
        while let Ok(event) = self.events.try_recv() {
            self.host.show(&event);
        }
        record_geometry(&self.host, recorder.as_mut());

        tracing::info!("Display instance for '{}' stopped", self.config.entry.name);
        Ok(self.host)
    }
}

fn open_window<H: DisplayHost>(
    host: &mut H,
    config: &InstanceConfig,
    state: &AppState,
    saved: Option<&WindowState>,
) {
    let (width, height) = window_dimensions(saved, &config.config);
    let setup = WindowSetup {
        title: config.entry.name.clone(),
        width,
        height,
        font_size: config.config.font_size,
        chrome_css: config.config.chrome_css_contents(),
    };
    host.open(&setup, &state.entries(), state.current_index());

    if let Some((x, y)) = window_position(saved, &config.config) {
        if position_is_visible(x, y, width, height, &host.screens()) {
            host.set_position(x, y);
        } else {
            tracing::debug!("Saved position ({}, {}) is off-screen, ignoring", x, y);
        }
    }
}

fn record_geometry<H: DisplayHost>(host: &H, recorder: Option<&mut GeometryRecorder>) {
    let (Some(recorder), Some(outer)) = (recorder, host.geometry()) else {
        return;
    };
    let title_bar = if cfg!(target_os = "macos") {
        MACOS_TITLE_BAR_HEIGHT
    } else {
        0
    };
    recorder.record(WindowState::from_outer(outer, title_bar));
}
