//! Boundary to the native display host
//!
//! The display host renders content and owns the window. The rest of the
//! crate only hands it [`DisplayEvent`]s and asks about window geometry.

use serde::Serialize;

use crate::geometry::{ScreenSize, WindowState};
use crate::model::ContentEntry;

mod headless;

pub use headless::HeadlessHost;

/// Change to show, carrying the snapshot produced by the mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum DisplayEvent {
    /// An entry joined the list; the selection did not move
    #[serde(rename = "file-added")]
    EntryAdded {
        #[serde(rename = "files")]
        entries: Vec<ContentEntry>,
        index: usize,
        /// Selection after the insert
        #[serde(rename = "currentIndex")]
        current_index: usize,
    },
    /// An entry's content was replaced (or added) and is now selected
    #[serde(rename = "content-replaced")]
    ContentReplaced {
        #[serde(rename = "files")]
        entries: Vec<ContentEntry>,
        #[serde(rename = "currentIndex")]
        current_index: usize,
    },
}

impl DisplayEvent {
    pub fn entries(&self) -> &[ContentEntry] {
        match self {
            Self::EntryAdded { entries, .. } | Self::ContentReplaced { entries, .. } => entries,
        }
    }
}

/// Initial window setup handed to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSetup {
    pub title: String,
    pub width: i32,
    pub height: i32,
    pub font_size: u32,
    pub chrome_css: String,
}

/// Native window that shows content
pub trait DisplayHost: Send {
    /// Create the window showing the initial entries
    fn open(&mut self, setup: &WindowSetup, entries: &[ContentEntry], current: usize);

    /// Show the result of a state change
    fn show(&mut self, event: &DisplayEvent);

    /// Current outer geometry, if the window exists
    fn geometry(&self) -> Option<WindowState>;

    fn set_position(&mut self, x: i32, y: i32);

    /// Attached screens, used to keep restored windows reachable
    fn screens(&self) -> Vec<ScreenSize>;

    /// Whether the user still has the window open
    fn is_open(&self) -> bool;
}
