//! Window geometry: persisted state, initial layout and debounced saving

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::Config;

pub const DEFAULT_WINDOW_WIDTH: i32 = 900;
pub const DEFAULT_WINDOW_HEIGHT: i32 = 700;
pub const MIN_WINDOW_WIDTH: i32 = 400;
pub const MIN_WINDOW_HEIGHT: i32 = 300;

/// Title bar height on macOS. Hosts report outer height but take content
/// height when opening a window.
pub const MACOS_TITLE_BAR_HEIGHT: i32 = 28;

/// Pixels of a restored window that must stay reachable on screen
const MIN_VISIBLE: i32 = 100;

/// Saved window geometry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowState {
    pub width: i32,
    pub height: i32,
    pub x: i32,
    pub y: i32,
}

impl WindowState {
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Convert outer geometry reported by a host into what gets saved.
    pub fn from_outer(outer: WindowState, title_bar: i32) -> Self {
        Self {
            height: (outer.height - title_bar).max(MIN_WINDOW_HEIGHT),
            ..outer
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: i32,
    pub height: i32,
}

/// `state.json` next to the config file
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store in the user's config directory
    pub fn from_system() -> Option<Self> {
        Config::config_dir().map(|dir| Self::new(dir.join("state.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved state, or `None` when missing, unreadable or invalid.
    pub fn load(&self) -> Option<WindowState> {
        let data = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<WindowState>(&data) {
            Ok(state) if state.is_valid() => Some(state),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Failed to parse state file {:?}: {}", self.path, e);
                None
            }
        }
    }

    /// Save `state`; invalid state is skipped.
    pub fn save(&self, state: &WindowState) -> io::Result<()> {
        if !state.is_valid() {
            return Ok(());
        }
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(state).map_err(io::Error::other)?;
        std::fs::write(&self.path, json)
    }
}

/// Initial width and height: hardcoded defaults, then config defaults, then
/// saved state, clamped to the minimum size.
pub fn window_dimensions(state: Option<&WindowState>, config: &Config) -> (i32, i32) {
    let mut width = DEFAULT_WINDOW_WIDTH;
    let mut height = DEFAULT_WINDOW_HEIGHT;

    if config.default_width > 0 {
        width = config.default_width;
    }
    if config.default_height > 0 {
        height = config.default_height;
    }
    if let Some(state) = state.filter(|s| s.is_valid()) {
        width = state.width;
        height = state.height;
    }

    (width.max(MIN_WINDOW_WIDTH), height.max(MIN_WINDOW_HEIGHT))
}

/// Initial position from saved state or config defaults; `None` lets the
/// OS decide.
pub fn window_position(state: Option<&WindowState>, config: &Config) -> Option<(i32, i32)> {
    if let Some(state) = state.filter(|s| s.is_valid()) {
        return Some((state.x, state.y));
    }
    if config.default_x != 0 || config.default_y != 0 {
        return Some((config.default_x, config.default_y));
    }
    None
}

/// Whether a window at this position stays reachable on the attached
/// screens. Screens are assumed to sit side by side.
pub fn position_is_visible(x: i32, y: i32, width: i32, height: i32, screens: &[ScreenSize]) -> bool {
    if screens.is_empty() {
        return true;
    }
    let total_width = screens.iter().fold(0i32, |sum, s| sum.saturating_add(s.width));
    let max_height = screens.iter().map(|s| s.height).max().unwrap_or(0);

    let right = x.saturating_add(width);
    let bottom = y.saturating_add(height);
    !(right < MIN_VISIBLE
        || x > total_width.saturating_sub(MIN_VISIBLE)
        || bottom < MIN_VISIBLE
        || y > max_height.saturating_sub(MIN_VISIBLE))
}

/// Saves geometry only when it changed since the last successful save
#[derive(Debug)]
pub struct GeometryRecorder {
    store: StateStore,
    last_saved: Option<WindowState>,
}

impl GeometryRecorder {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            last_saved: None,
        }
    }

    /// Returns whether anything was written.
    pub fn record(&mut self, geometry: WindowState) -> bool {
        if !geometry.is_valid() || self.last_saved == Some(geometry) {
            return false;
        }
        match self.store.save(&geometry) {
            Ok(()) => {
                tracing::debug!("Saved window geometry {:?}", geometry);
                self.last_saved = Some(geometry);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to save window geometry: {}", e);
                false
            }
        }
    }
}
